mod claims;
mod jwt;

pub use claims::{CallerIdentity, Claims};
pub use jwt::JwtValidator;
