// dbdump/src/lib.rs
//! Interactive database dump tool.
//!
//! A terminal wizard picks a stored connection, its databases and their tables, then a
//! destination directory. The validated selection is handed to a per-driver dump strategy, one
//! database at a time.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod dump;
pub mod errors;
pub mod logging;
pub mod wizard;
