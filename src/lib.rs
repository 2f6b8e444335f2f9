//! Merges several RSS/Atom feeds into one normalized RSS 2.0 document.

pub mod aggregate;
pub mod config;
pub mod feed;
pub mod server;
pub mod util;
