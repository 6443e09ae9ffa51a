//! Cart domain model and commands.

pub mod commands;
pub mod model;
