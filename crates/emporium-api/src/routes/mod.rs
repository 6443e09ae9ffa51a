//! Route modules, one per service.

pub mod cart;
pub mod health;
pub mod order;
pub mod product;
pub mod user;
