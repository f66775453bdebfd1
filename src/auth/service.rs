use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::auth::password::PasswordHasher;
use crate::auth::token;
use crate::auth::validation::Violations;
use crate::db::models::{to_document, NewSession, NewUser};
use crate::db::{Collection, Filter, RecordStore, User, UserSession, UserView};
use crate::error::{AppError, AuthError, StoreError};

#[derive(Debug, Default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Reads a registration body, reporting type and content violations in one
    /// list. Missing fields count as empty.
    pub fn from_json(body: &Value) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let fields = violations.require_object(body);

        let name = violations.require_string(fields, "name");
        if let Some(name) = &name {
            violations.require_non_empty("name", name);
        }
        let email = violations.require_string(fields, "email");
        if let Some(email) = &email {
            violations.require_email("email", email);
        }
        let password = violations.require_string(fields, "password");
        if let Some(password) = &password {
            violations.require_non_empty("password", password);
        }
        violations.finish().map_err(AppError::ValidationError)?;

        Ok(Self {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserView,
    pub token: String,
}

/// Registration, login and session resolution over the `users` and
/// `sessions` collections.
pub struct AuthService {
    store: Arc<dyn RecordStore>,
    hasher: PasswordHasher,
    // verified against when the email is unknown, so both failures cost one hash
    decoy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(store: Arc<dyn RecordStore>, hasher: PasswordHasher) -> Self {
        Self {
            store,
            hasher,
            decoy_hash: OnceCell::new(),
        }
    }

    async fn decoy_hash(&self) -> Result<&str, AppError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| async { self.hasher.hash(&token::issue()).await })
            .await?;
        Ok(hash.as_str())
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<(), AppError> {
        Violations::new()
            .require_non_empty("name", &req.name)
            .require_email("email", &req.email)
            .require_non_empty("password", &req.password)
            .finish()
            .map_err(AppError::ValidationError)?;

        let existing = self
            .store
            .find_one(Collection::Users, &Filter::field("email", req.email.as_str()))
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict);
        }

        let password_hash = self.hasher.hash(&req.password).await?;
        let document = to_document(&NewUser {
            name: req.name.clone(),
            email: req.email.clone(),
            password_hash,
        })?;

        // The unique index still catches a registration racing past the check above.
        match self.store.insert_one(Collection::Users, document).await {
            Ok(id) => {
                info!("Registered user {}", id);
                Ok(())
            }
            Err(StoreError::Duplicate { .. }) => Err(AppError::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<UserView>, AppError> {
        let records = self.store.find_all(Collection::Users).await?;
        records
            .into_iter()
            .map(|record| User::try_from(record).map(UserView::from).map_err(AppError::from))
            .collect()
    }

    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AppError> {
        let Some(record) = self
            .store
            .find_one(Collection::Users, &Filter::field("email", req.email.as_str()))
            .await?
        else {
            let decoy = self.decoy_hash().await?;
            self.hasher.verify(&req.password, decoy).await?;
            return Err(AuthError::InvalidCredentials.into());
        };
        let user = User::try_from(record)?;

        if !self.hasher.verify(&req.password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = token::issue();
        let document = to_document(&NewSession {
            token: token.clone(),
            user_id: user.id,
        })?;
        self.store.insert_one(Collection::Sessions, document).await?;
        info!("Opened session for user {}", user.id);

        Ok(LoginResponse {
            user: user.into(),
            token,
        })
    }

    pub async fn current_user(&self, token: &str) -> Result<UserView, AppError> {
        let record = self
            .store
            .find_one(Collection::Sessions, &Filter::field("token", token))
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let session = UserSession::try_from(record)?;

        let Some(record) = self
            .store
            .find_one(Collection::Users, &Filter::id(session.user_id))
            .await?
        else {
            warn!(
                "Session {} references missing user {}",
                session.id, session.user_id
            );
            return Err(AuthError::InvalidToken.into());
        };

        Ok(User::try_from(record)?.into())
    }

    /// Idempotent: removing an unknown token is not an error.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let removed = self
            .store
            .delete_one(Collection::Sessions, &Filter::field("token", token))
            .await?;
        if removed > 0 {
            info!("Closed session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MockRecordStore;
    use crate::db::MemoryRecordStore;
    use serde_json::json;

    fn service_with(store: Arc<dyn RecordStore>) -> AuthService {
        AuthService::new(store, PasswordHasher::new(1024, 1, 1).unwrap())
    }

    fn ana() -> RegisterRequest {
        RegisterRequest {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            password: "secret123".into(),
        }
    }

    #[test]
    fn test_register_body_type_errors_are_listed_with_content_errors() {
        let err = RegisterRequest::from_json(&json!({ "name": 5, "email": "nope" })).unwrap_err();
        match err {
            AppError::ValidationError(details) => assert_eq!(
                details,
                vec![
                    "\"name\" must be a string".to_string(),
                    "\"email\" must be a valid email".to_string(),
                    "\"password\" is not allowed to be empty".to_string(),
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }

        let req = RegisterRequest::from_json(&json!({
            "name": "Ana",
            "email": "ana@x.com",
            "password": "secret123",
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(req.name, "Ana");
    }

    fn login_as(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_register_then_conflict() {
        let store = Arc::new(MemoryRecordStore::new());
        let service = service_with(store.clone());

        service.register(&ana()).await.unwrap();
        let err = service.register(&ana()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));

        let users = service.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "ana@x.com");

        let stored = store.find_all(Collection::Users).await.unwrap();
        let hash = stored[0].document["passwordHash"].as_str().unwrap();
        assert_ne!(hash, "secret123");
    }

    #[tokio::test]
    async fn test_register_reports_every_violation() {
        let service = service_with(Arc::new(MemoryRecordStore::new()));
        let err = service
            .register(&RegisterRequest {
                name: String::new(),
                email: "not-an-email".into(),
                password: String::new(),
            })
            .await
            .unwrap_err();

        match err {
            AppError::ValidationError(details) => assert_eq!(details.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_registrations_create_one_user() {
        let store = Arc::new(MemoryRecordStore::new());
        let service = Arc::new(service_with(store.clone()));

        let (req_a, req_b) = (ana(), ana());
        let (a, b) = tokio::join!(service.register(&req_a), service.register(&req_b));
        let created = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(created, 1);
        assert_eq!(store.find_all(Collection::Users).await.unwrap().len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_resolve_logout() {
        let service = service_with(Arc::new(MemoryRecordStore::new()));
        service.register(&ana()).await.unwrap();

        let login = service.login(&login_as("ana@x.com", "secret123")).await.unwrap();
        assert_eq!(login.user.name, "Ana");

        let current = service.current_user(&login.token).await.unwrap();
        assert_eq!(current, login.user);

        service.logout(&login.token).await.unwrap();
        let err = service.current_user(&login.token).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));

        // second logout is still fine
        service.logout(&login.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service_with(Arc::new(MemoryRecordStore::new()));
        service.register(&ana()).await.unwrap();

        let wrong_password = service.login(&login_as("ana@x.com", "nope")).await.unwrap_err();
        let unknown_email = service.login(&login_as("bob@x.com", "secret123")).await.unwrap_err();
        assert!(matches!(wrong_password, AppError::AuthError(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies_a_hash() {
        let service = service_with(Arc::new(MemoryRecordStore::new()));
        assert!(service.decoy_hash.get().is_none());

        let err = service.login(&login_as("bob@x.com", "secret123")).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));

        let decoy = service.decoy_hash.get().unwrap();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(!service.hasher.verify("secret123", decoy).await.unwrap());
    }

    #[tokio::test]
    async fn test_each_login_opens_a_session() {
        let store = Arc::new(MemoryRecordStore::new());
        let service = service_with(store.clone());
        service.register(&ana()).await.unwrap();

        let first = service.login(&login_as("ana@x.com", "secret123")).await.unwrap();
        let second = service.login(&login_as("ana@x.com", "secret123")).await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(store.find_all(Collection::Sessions).await.unwrap().len(), 2);

        service.logout(&first.token).await.unwrap();
        assert!(service.current_user(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_dangling_session_is_unauthorized() {
        let store = Arc::new(MemoryRecordStore::new());
        let service = service_with(store.clone());
        service.register(&ana()).await.unwrap();
        let login = service.login(&login_as("ana@x.com", "secret123")).await.unwrap();

        store
            .delete_one(Collection::Users, &Filter::id(login.user.id))
            .await
            .unwrap();

        let err = service.current_user(&login.token).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_store_error() {
        let mut store = MockRecordStore::new();
        store
            .expect_find_all()
            .returning(|_| Err(StoreError::Unavailable("connection reset".into())));
        store
            .expect_find_one()
            .returning(|_, _| Err(StoreError::Unavailable("connection reset".into())));

        let service = service_with(Arc::new(store));
        let err = service.list_users().await.unwrap_err();
        assert!(matches!(err, AppError::StoreError(StoreError::Unavailable(_))));

        let err = service.login(&login_as("ana@x.com", "secret123")).await.unwrap_err();
        assert!(matches!(err, AppError::StoreError(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_insert_duplicate_maps_to_conflict() {
        let mut store = MockRecordStore::new();
        store.expect_find_one().returning(|_, _| Ok(None));
        store
            .expect_insert_one()
            .times(1)
            .returning(|collection, _| Err(collection.duplicate()));

        let service = service_with(Arc::new(store));
        let err = service.register(&ana()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));
    }
}
