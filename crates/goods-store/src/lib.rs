//! Goods Store — PostgreSQL persistence for goods and their outbox.
//!
//! Schema lives in the workspace `migrations/` directory.

pub mod pg_good_repository;
