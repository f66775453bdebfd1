use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::store::{Document, Record};
use crate::error::StoreError;

/// Stored user document. Field names follow the persisted document layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
}

pub(crate) fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(StoreError::Corrupt(format!("expected an object, got {other}"))),
        Err(e) => Err(StoreError::Corrupt(e.to_string())),
    }
}

fn from_document<T: for<'de> Deserialize<'de>>(record: Record) -> Result<(Uuid, T), StoreError> {
    let id = record.id;
    let value = serde_json::from_value(Value::Object(record.document))
        .map_err(|e| StoreError::Corrupt(format!("record {id}: {e}")))?;
    Ok((id, value))
}

impl TryFrom<Record> for User {
    type Error = StoreError;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let (id, stored): (Uuid, NewUser) = from_document(record)?;
        Ok(Self {
            id,
            name: stored.name,
            email: stored.email,
            password_hash: stored.password_hash,
        })
    }
}

impl TryFrom<Record> for UserSession {
    type Error = StoreError;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let (id, stored): (Uuid, NewSession) = from_document(record)?;
        Ok(Self {
            id,
            token: stored.token,
            user_id: stored.user_id,
        })
    }
}

/// Public projection of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// Product as returned to clients: the stored fields plus the assigned id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Document,
}

impl From<Record> for ProductView {
    fn from(record: Record) -> Self {
        let mut fields = record.document;
        // the store id is authoritative
        fields.remove("id");
        Self {
            id: record.id,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_document_layout() {
        let document = to_document(&NewUser {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            password_hash: "$argon2id$...".into(),
        })
        .unwrap();
        assert_eq!(document["passwordHash"], "$argon2id$...");

        let user = User::try_from(Record { id: Uuid::new_v4(), document }).unwrap();
        assert_eq!(user.email, "ana@x.com");

        let view = serde_json::to_value(UserView::from(user)).unwrap();
        assert!(view.get("passwordHash").is_none());
        assert_eq!(view["name"], "Ana");
    }

    #[test]
    fn test_corrupt_user_record() {
        let document = json!({ "name": "Ana" }).as_object().cloned().unwrap();
        let err = User::try_from(Record { id: Uuid::new_v4(), document }).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_product_view_flattens_fields() {
        let id = Uuid::new_v4();
        let document = json!({ "name": "Guitar", "type": "instruments", "id": "spoofed" })
            .as_object()
            .cloned()
            .unwrap();
        let view = serde_json::to_value(ProductView::from(Record { id, document })).unwrap();
        assert_eq!(view["id"], json!(id));
        assert_eq!(view["name"], "Guitar");
        assert_eq!(view["type"], "instruments");
    }
}
