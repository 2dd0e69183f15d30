//! `labstock-auth`: identity boundary consumed by the inventory workflows.
//!
//! The workflows only ever see a [`Session`] (user id, display name, role).
//! Where that session comes from (a JWT, an identity provider, a test) is
//! decided by the caller and injected explicitly.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod permissions;
pub mod roles;
pub mod session;

pub use authorize::{AuthzError, authorize};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use identity::{IdentityError, IdentityProvider, InMemoryIdentityProvider, SessionChange};
pub use permissions::Permission;
pub use roles::Role;
pub use session::{Person, Session};
