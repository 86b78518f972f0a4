use storefront_auth::Identity;
use storefront_core::UserId;

/// Caller context for a request, derived from a verified token.
///
/// This is immutable and present for every authenticated route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    identity: Identity,
}

impl CallerContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.identity.is_admin
    }
}
