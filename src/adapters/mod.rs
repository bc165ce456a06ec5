// Adapters layer: concrete implementations of the domain ports.

pub mod file_cache;
pub mod http_client;
pub mod json_writer;
pub mod memory_cache;

pub use file_cache::FileCache;
pub use http_client::{HttpClientFactory, TrackerHttpClient};
pub use json_writer::JsonLinesWriter;
pub use memory_cache::MemoryCache;
