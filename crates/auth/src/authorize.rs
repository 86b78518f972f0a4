use thiserror::Error;

use crate::Identity;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: administrator privileges required")]
    AdminRequired,
}

/// Gate privileged operations (listing every order, changing status).
///
/// - No IO
/// - No panics
pub fn require_admin(identity: &Identity) -> Result<(), AuthzError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}
