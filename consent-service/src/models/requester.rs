use uuid::Uuid;

/// Identity asserted by the trusted gateway for the current request.
///
/// `is_service` marks internal callers such as the rendering service that
/// displays stories on partner sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub is_service: bool,
}

impl Requester {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
            is_service: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
            is_service: false,
        }
    }

    pub fn service(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
            is_service: true,
        }
    }

    /// May act on behalf of consuming sites: report views, read site feeds.
    pub fn acts_for_sites(&self) -> bool {
        self.is_admin || self.is_service
    }
}
