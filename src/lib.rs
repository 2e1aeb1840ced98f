//! Read-only code explorer over an in-memory project snapshot: path
//! resolution, a bounded set of open tabs and in-buffer search, plus the
//! HTTP surface a browser shell drives them through.

pub mod config;
pub mod explorer;
pub mod file_system;
pub mod handlers;
pub mod models;
pub mod search;
pub mod tabs;
pub mod tree;
