pub mod consent;
pub mod embed;
pub mod health;
pub mod metrics;
pub mod share;
pub mod tag;

pub use health::health_check;
