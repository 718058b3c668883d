pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    extract::MatchedPath,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::health_check;
use crate::services::{
    Clock, ConsentRegistry, ConsentStore, RevocationNotifier, ShareTokens, SyndicationGateway,
    TagConsent,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConsentStore>,
    pub registry: Arc<ConsentRegistry>,
    pub shares: Arc<ShareTokens>,
    pub syndication: Arc<SyndicationGateway>,
    pub tags: Arc<TagConsent>,
    pub public_rate_limiter: IpRateLimiter,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ConsentStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RevocationNotifier>,
        share_base_url: &str,
        public_rate_limiter: IpRateLimiter,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            registry: Arc::new(ConsentRegistry::new(
                store.clone(),
                clock.clone(),
                notifier,
            )),
            shares: Arc::new(ShareTokens::new(store.clone(), clock.clone(), share_base_url)),
            syndication: Arc::new(SyndicationGateway::new(store.clone(), clock.clone())),
            tags: Arc::new(TagConsent::new(store.clone(), clock)),
            store,
            public_rate_limiter,
            allowed_origins,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Owner-facing routes. Callers are identified by the gateway headers.
    let owner_routes = Router::new()
        .route(
            "/consent/grant",
            post(handlers::consent::grant).patch(handlers::consent::update),
        )
        .route("/consent/revoke", delete(handlers::consent::revoke))
        .route("/consent/revoke-all", delete(handlers::consent::revoke_all))
        .route("/consent/status", get(handlers::consent::status))
        .route(
            "/consent/sites/:site_id/stories",
            get(handlers::consent::site_stories),
        )
        .route("/consent/views", post(handlers::consent::record_view))
        .route(
            "/share/tokens",
            post(handlers::share::issue).get(handlers::share::list),
        )
        .route("/share/tokens/:token_id", delete(handlers::share::revoke))
        .route(
            "/syndication/:gallery_id/sites/:site_id",
            put(handlers::embed::set_consent),
        )
        .route("/embed/tokens", post(handlers::embed::issue))
        .route("/embed/tokens/:token_id", delete(handlers::embed::revoke))
        .route("/tag/propose", post(handlers::tag::propose))
        .route("/tag/respond", patch(handlers::tag::respond))
        .route("/tag/remove", delete(handlers::tag::remove))
        .layer(owner_cors(&state.allowed_origins));

    // Unauthenticated token endpoints, embeddable from any origin.
    let public_routes = Router::new()
        .route("/share/:token", get(handlers::share::validate))
        .route("/embed/:gallery_id", get(handlers::embed::resolve))
        .layer(from_fn_with_state(
            state.public_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS]),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(owner_routes)
        .merge(public_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        // Log the route template, not the URI: paths and queries carry tokens.
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|p| p.as_str())
                .unwrap_or("unmatched");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                route = %route,
                version = ?request.version(),
                user_id = tracing::field::Empty,
            )
        }))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

fn owner_cors(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-role"),
            HeaderName::from_static("x-request-id"),
        ])
}
