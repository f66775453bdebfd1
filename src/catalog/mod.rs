//! Product catalog: list and create products with arbitrary fields.

pub mod handlers;
mod service;

pub use service::CatalogService;
