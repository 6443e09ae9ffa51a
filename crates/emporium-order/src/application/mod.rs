pub mod command_handlers;
pub mod query_handlers;
pub mod replication;
pub mod saga;
