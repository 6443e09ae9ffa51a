//! Emporium Core: contracts shared by every service.
//!
//! This crate defines the event envelope and topic contracts, the document
//! storage abstraction that authoritative collections and replicas are kept
//! in, and the domain error taxonomy. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod document;
pub mod envelope;
pub mod error;
