//! Domain rules for the goods catalog.

pub mod validation;
