//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod app_config_repo;
pub mod customer_repo;

pub use app_config_repo::AppConfigRepo;
pub use customer_repo::CustomerRepo;
