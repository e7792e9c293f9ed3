//! Command-line front end for tender similarity search.
//!
//! The binary (`tenders`) is a thin layer over [`App`]; everything that
//! can be tested without a terminal lives in this library.

pub mod app;
pub mod feed;
pub mod render;
pub mod shell;
pub mod stats;

pub use app::App;
