use async_trait::async_trait;
use uuid::Uuid;

use crate::models::ConsentGrant;

/// Told about every successful consent revocation, e.g. to purge a site's
/// copy of the story. Delivery is best effort.
#[async_trait]
pub trait RevocationNotifier: Send + Sync {
    async fn consent_revoked(&self, grant: &ConsentGrant) -> Result<(), anyhow::Error>;
}

/// Emits the revocation as a structured log event for downstream collectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl RevocationNotifier for LogNotifier {
    async fn consent_revoked(&self, grant: &ConsentGrant) -> Result<(), anyhow::Error> {
        tracing::info!(
            visibility_id = %grant.visibility_id,
            story_id = %grant.story_id,
            site_id = %grant.site_id,
            "Consent revocation published"
        );
        Ok(())
    }
}

/// Records notified grants; can be told to fail.
pub struct MockNotifier {
    pub notified: std::sync::Mutex<Vec<Uuid>>,
    pub fail: bool,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            notified: std::sync::Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            notified: std::sync::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn notified(&self) -> Vec<Uuid> {
        self.notified.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RevocationNotifier for MockNotifier {
    async fn consent_revoked(&self, grant: &ConsentGrant) -> Result<(), anyhow::Error> {
        self.notified
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock notifier mutex poisoned: {}", e))?
            .push(grant.visibility_id);
        if self.fail {
            anyhow::bail!("notifier unavailable");
        }
        Ok(())
    }
}
