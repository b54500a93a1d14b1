//! Domain types shared by the cold-email worker crates.
//!
//! - [`types`]: primary key and timestamp aliases.
//! - [`status`]: the recipient lifecycle ([`CustomerStatus`]).
//! - [`template`]: subject/body rendering with placeholder substitution and
//!   per-recipient unsubscribe links.

pub mod error;
pub mod status;
pub mod template;
pub mod types;

pub use error::CoreError;
pub use status::CustomerStatus;
