//! Goods Core — shared domain model and ports.
//!
//! This crate defines the records, commands, errors and the traits every
//! adapter implements. It contains no infrastructure code.

pub mod cache;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod good;
pub mod relay;
pub mod repository;
