// crates/db/src/queries/mod.rs
//! Typed query modules, grouped by table family.

pub mod requests;
mod row_types;
pub mod search_logs;
pub mod sessions;
pub mod system;
pub mod usage;
pub mod users;
