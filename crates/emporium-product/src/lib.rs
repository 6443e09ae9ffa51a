//! Emporium: Product catalogue service.
//!
//! Owns the authoritative product collection. Every write publishes a product
//! snapshot on `Product-Topic`; stock reserved or released by the order saga
//! arrives back on `Order-Topic-Product`.

pub mod application;
pub mod domain;
