//! `storefront-auth` — identity boundary consumed by the order core.
//!
//! Credentials are issued elsewhere. This crate verifies bearer tokens and reduces them
//! to an `Identity` (`user_id`, `is_admin`); it is intentionally decoupled from HTTP and
//! storage.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod jwt;

pub use authorize::{require_admin, AuthzError};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use identity::Identity;
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
