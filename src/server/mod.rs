//! HTTP server for Townhall

pub mod http;

pub use http::{run, AppState};
