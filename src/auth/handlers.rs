use actix_web::{web, HttpRequest, HttpResponse};
use crate::AppState;
use crate::auth::service::{LoginRequest, RegisterRequest};
use crate::error::{AppError, AuthError};
use serde_json::Value;
use tracing::{info, warn, error};

/// Token from an `Authorization: Bearer <token>` header. Missing header,
/// another scheme or an empty token all count as no token.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let users = state.auth_service.list_users().await.map_err(|e| {
        error!("Listing users failed: {}", e);
        e
    })?;
    Ok(HttpResponse::Ok().json(users))
}

pub async fn register(
    body: web::Json<Value>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = RegisterRequest::from_json(&body).map_err(|e| {
        warn!("Rejected registration body: {}", e);
        e
    })?;
    info!("Received registration request for email: {}", req.email);

    match state.auth_service.register(&req).await {
        Ok(()) => {
            info!("Registration successful for email: {}", req.email);
            Ok(HttpResponse::Created().finish())
        }
        Err(e) => {
            warn!("Registration failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);

    match state.auth_service.login(&req).await {
        Ok(session) => {
            info!("Login successful for email: {}", req.email);
            Ok(HttpResponse::Ok().json(session))
        }
        Err(e) => {
            warn!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn current_user(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.current_user(token).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    state.auth_service.logout(token).await?;
    Ok(HttpResponse::Ok().finish())
}
