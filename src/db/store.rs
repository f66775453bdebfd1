use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StoreError;

/// Schema-flexible body of a stored record.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Sessions,
    Products,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Sessions => "sessions",
            Collection::Products => "products",
        }
    }

    /// Document field the store keeps unique within this collection.
    pub fn unique_key(self) -> &'static str {
        match self {
            Collection::Users => "email",
            Collection::Sessions => "token",
            Collection::Products => "name",
        }
    }

    pub(crate) fn duplicate(self) -> StoreError {
        StoreError::Duplicate {
            collection: self.name(),
            field: self.unique_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub document: Document,
}

/// Exact-match selector for `find_one` and `delete_one`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Id(Uuid),
    Field { name: String, value: Value },
}

impl Filter {
    pub fn id(id: Uuid) -> Self {
        Filter::Id(id)
    }

    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Id(id) => record.id == *id,
            Filter::Field { name, value } => record.document.get(name) == Some(value),
        }
    }
}

/// Gateway to the document store. Implementations enforce each collection's
/// [`Collection::unique_key`] on insert and never retry failed operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError>;

    /// Every record in the collection, unpaginated.
    async fn find_all(&self, collection: Collection) -> Result<Vec<Record>, StoreError>;

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Uuid, StoreError>;

    /// Removes at most one matching record and returns how many were removed.
    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(document: Value) -> Record {
        Record {
            id: Uuid::new_v4(),
            document: document.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_field_filter_is_exact() {
        let r = record(json!({ "email": "ana@x.com", "name": "Ana" }));
        assert!(Filter::field("email", "ana@x.com").matches(&r));
        assert!(!Filter::field("email", "ANA@x.com").matches(&r));
        assert!(!Filter::field("missing", "ana@x.com").matches(&r));
    }

    #[test]
    fn test_id_filter() {
        let r = record(json!({ "name": "Guitar" }));
        assert!(Filter::id(r.id).matches(&r));
        assert!(!Filter::id(Uuid::new_v4()).matches(&r));
    }

    #[test]
    fn test_unique_keys() {
        assert_eq!(Collection::Users.unique_key(), "email");
        assert_eq!(Collection::Products.unique_key(), "name");
        assert_eq!(
            Collection::Sessions.duplicate(),
            StoreError::Duplicate { collection: "sessions", field: "token" }
        );
    }
}
