pub mod bucket;
pub mod cache;
pub mod gamma_api;
pub mod http;
pub mod markets;
pub mod types;
pub mod weather;
