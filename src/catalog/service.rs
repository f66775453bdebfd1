use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::auth::validation::Violations;
use crate::db::{Collection, Document, Filter, ProductView, Record, RecordStore};
use crate::error::{AppError, StoreError};

pub struct CatalogService {
    store: Arc<dyn RecordStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list_products(&self) -> Result<Vec<ProductView>, AppError> {
        let records = self.store.find_all(Collection::Products).await?;
        Ok(records.into_iter().map(ProductView::from).collect())
    }

    /// Stores the body's fields verbatim. The body must be an object whose
    /// `name` is a non-empty string unique across the catalog.
    pub async fn create_product(&self, body: Value) -> Result<ProductView, AppError> {
        let mut violations = Violations::new();
        let fields = violations.require_object(&body);
        let name = violations.require_string(fields, "name");
        if let Some(name) = &name {
            violations.require_non_empty("name", name);
        }
        violations.finish().map_err(AppError::ValidationError)?;

        let name = name.unwrap_or_default();
        let mut product = match body {
            Value::Object(product) => product,
            _ => Document::new(),
        };
        // ids are assigned by the store
        product.remove("id");

        let existing = self
            .store
            .find_one(Collection::Products, &Filter::field("name", name.as_str()))
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict);
        }

        let id = match self.store.insert_one(Collection::Products, product.clone()).await {
            Ok(id) => id,
            Err(StoreError::Duplicate { .. }) => return Err(AppError::Conflict),
            Err(e) => return Err(e.into()),
        };
        info!("Created product {} ({})", name, id);

        Ok(Record { id, document: product }.into())
    }
}
