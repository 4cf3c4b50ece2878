mod client;
pub mod endpoints;
mod transport;
pub mod types;

pub use client::{error_from_body, HttpTransport};
pub use transport::{get_fetcher, Transport};
