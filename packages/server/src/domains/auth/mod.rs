// Authentication domain
//
// Token issuance lives with the identity provider; this service only
// verifies tokens and exposes `create_token` for that provider and for
// tests.

pub mod jwt;

pub use jwt::{Claims, JwtService};
