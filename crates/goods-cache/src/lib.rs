//! Goods Cache — Redis storage for the goods list view.

pub mod redis_cache;
