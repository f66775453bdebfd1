use argon2::{
    password_hash::{rand_core, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::AuthConfig;
use crate::error::AppError;

/// Argon2id hashing with a per-call random salt. Output is a PHC string, so
/// the salt and cost parameters travel with the hash.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::ConfigError(format!("invalid password hash parameters: {e}")))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        Self::new(config.hash_memory_kib, config.hash_iterations, config.hash_parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    #[tracing::instrument(name = "Computing password hash", skip_all)]
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.argon2();
        let password = password.to_owned();
        let current_span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            current_span.in_scope(|| {
                let salt = SaltString::generate(&mut rand_core::OsRng);
                hasher
                    .hash_password(password.as_bytes(), &salt)
                    .map(|h| h.to_string())
                    .map_err(|e| AppError::InternalError(e.to_string()))
            })
        })
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
    }

    /// `Ok(false)` on mismatch; an unparsable stored hash is an error.
    #[tracing::instrument(name = "Verifying password hash", skip_all)]
    pub async fn verify(&self, password: &str, expected_hash: &str) -> Result<bool, AppError> {
        let verifier = self.argon2();
        let password = password.to_owned();
        let expected_hash = expected_hash.to_owned();
        let current_span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            current_span.in_scope(|| {
                let expected = PasswordHash::new(&expected_hash).map_err(|e| {
                    AppError::InternalError(format!("stored password hash is malformed: {e}"))
                })?;
                match verifier.verify_password(password.as_bytes(), &expected) {
                    Ok(()) => Ok(true),
                    Err(argon2::password_hash::Error::Password) => Ok(false),
                    Err(e) => Err(AppError::InternalError(e.to_string())),
                }
            })
        })
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
    }
}
