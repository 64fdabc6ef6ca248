pub mod cli;
pub mod config;
mod db;
pub mod error;
pub mod extractor;
mod gallery;
pub mod ingest;
mod metrics;
pub mod model;
pub mod ranking;
pub mod server;
pub mod similarity;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use error::{Error, Result};
pub use gallery::{Gallery, GalleryBuilder};
