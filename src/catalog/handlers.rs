use actix_web::{web, HttpResponse};
use crate::AppState;
use crate::error::AppError;
use serde_json::Value;
use tracing::{info, warn};

pub async fn list_products(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let products = state.catalog.list_products().await?;
    Ok(HttpResponse::Ok().json(products))
}

pub async fn create_product(
    body: web::Json<Value>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.catalog.create_product(body.into_inner()).await {
        Ok(product) => {
            info!("Product {} added to catalog", product.id);
            Ok(HttpResponse::Ok().json(product))
        }
        Err(e) => {
            warn!("Product creation failed: {}", e);
            Err(e)
        }
    }
}
