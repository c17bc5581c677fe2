//! Request middleware

pub mod auth;

pub use auth::{auth_middleware, decode_claims, require_role, Claims, CurrentActor};
