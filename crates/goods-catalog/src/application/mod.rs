//! Application layer: command and query handlers plus the service facade.

pub mod command_handlers;
pub mod query_handlers;
pub mod service;
