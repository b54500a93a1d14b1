//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus any insert DTOs the repositories accept.

pub mod app_config;
pub mod customer;
