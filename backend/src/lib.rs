pub mod types;
pub mod helpers;
pub mod logger;
pub mod canon;
pub mod markup;
pub mod dataset;
pub mod api;
pub mod export;

/// Root path prefix of every generated API file.
pub static API_PREFIX: &'static str = "/api";
