//! Goods Catalog — the orchestration layer.
//!
//! Validates commands, delegates to the relational store and keeps the goods
//! list cache in step with every mutation.

pub mod application;
pub mod domain;
