//! Route modules.

pub mod goods;
pub mod health;
