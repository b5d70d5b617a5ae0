//! Authentication boundary: bearer tokens, password hashing and the
//! extractors that gate routes by role.

pub mod extractor;
pub mod password;
pub mod token;

pub use extractor::{AdminUser, AuthUser};
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use token::{Claims, TokenService};
