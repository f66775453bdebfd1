//! Authentication module
//!
//! Password hashing, session token issuance, and the user and session
//! routes built on them.

pub mod handlers;
pub mod password;
pub mod service;
pub mod token;
pub mod validation;

pub use password::PasswordHasher;
pub use service::{AuthService, LoginRequest, LoginResponse, RegisterRequest};
