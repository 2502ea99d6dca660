pub mod download;

pub use download::{fetch_to, fetch_verified, DownloadError};
