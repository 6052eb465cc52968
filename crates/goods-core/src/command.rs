//! Commands accepted by the goods catalog.
//!
//! These carry raw caller input; validation happens in the catalog service
//! before any store call.

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;
}

/// Create a good in a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGood {
    /// Owning project.
    pub project_id: i64,
    /// Display name. Must not be empty.
    pub name: String,
}

/// Replace the name and description of a good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGood {
    /// The good identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// New name. Must not be empty.
    pub name: String,
    /// New description. Must not be empty.
    pub description: String,
}

/// Soft-delete a good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteGood {
    /// The good identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
}

/// Read one page of goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListGoods {
    /// Page size.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

/// Set a new priority on a good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReprioritizeGood {
    /// The good identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// The priority to store. Must be positive.
    pub new_priority: i32,
}

impl Command for CreateGood {
    fn command_type(&self) -> &'static str {
        "goods.create"
    }
}

impl Command for UpdateGood {
    fn command_type(&self) -> &'static str {
        "goods.update"
    }
}

impl Command for DeleteGood {
    fn command_type(&self) -> &'static str {
        "goods.delete"
    }
}

impl Command for ListGoods {
    fn command_type(&self) -> &'static str {
        "goods.list"
    }
}

impl Command for ReprioritizeGood {
    fn command_type(&self) -> &'static str {
        "goods.reprioritize"
    }
}
