pub mod access;
pub mod clock;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod origin;
pub mod registry;
pub mod share;
pub mod store;
pub mod syndication;
pub mod tagging;
pub mod tokens;

pub use clock::{Clock, ManualClock, SystemClock};
pub use database::Database;
pub use memory::MemoryStore;
pub use notifier::{LogNotifier, MockNotifier, RevocationNotifier};
pub use registry::ConsentRegistry;
pub use share::ShareTokens;
pub use store::{ConsentStore, Directory};
pub use syndication::SyndicationGateway;
pub use tagging::TagConsent;
