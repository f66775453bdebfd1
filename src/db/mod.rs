//! Record store gateway.
//!
//! The service only needs exact-match lookups, full scans, inserts and
//! deletes over three collections, so that is all [`RecordStore`] offers.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryRecordStore;
pub use models::{User, UserSession, UserView, ProductView};
pub use postgres::PgRecordStore;
pub use store::{Collection, Document, Filter, Record, RecordStore};
