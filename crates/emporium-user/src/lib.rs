//! Emporium: User accounts service.
//!
//! Owns user accounts and publishes a [`domain::model::UserSnapshot`] (never
//! the password hash) on `User-Topic` after every write.

pub mod application;
pub mod domain;
