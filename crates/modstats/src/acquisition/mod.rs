//! HTTP acquisition shared by the marketplace clients and the scraper.

pub mod http_client;

pub use http_client::{HttpClient, HttpResponse};
