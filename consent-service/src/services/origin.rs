//! Hostname handling for embed domain restrictions.

use http::Uri;

/// Hosts that are always accepted so embeds can be previewed locally.
const DEV_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Reduce a URL or bare host to a lowercase hostname without `www.`, port
/// or path. Returns `None` when nothing host-like remains.
pub fn normalize_domain(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let host = if trimmed.contains("://") {
        let uri: Uri = trimmed.parse().ok()?;
        uri.host()?.to_string()
    } else {
        let authority = trimmed.split(['/', '?', '#']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);
        match authority.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
            _ => authority.to_string(),
        }
    };

    let host = host.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    if host.is_empty() || host.contains(char::is_whitespace) {
        None
    } else {
        Some(host)
    }
}

/// Whether `origin` may load content restricted to `allowed_domains`.
///
/// An empty allow-list means unrestricted. Otherwise the origin's host must
/// equal an entry or be a subdomain of one. A missing or unparseable origin
/// fails a restricted token.
pub fn domain_allowed(allowed_domains: &[String], origin: Option<&str>) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }
    let Some(host) = origin.and_then(normalize_domain) else {
        return false;
    };
    if DEV_HOSTS.contains(&host.as_str()) {
        return true;
    }
    allowed_domains
        .iter()
        .filter_map(|d| normalize_domain(d))
        .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
}
