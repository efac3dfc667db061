//! # storage-adapters
//!
//! Implementations of the `DataClient` and `ObjectStorage` ports. The
//! in-memory pair is always compiled; the rest sit behind features.

use thiserror::Error;

pub mod memory;
pub mod ordering;

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(any(feature = "db-rest", feature = "media-rest"))]
pub mod rest;

#[cfg(feature = "media-local")]
pub mod local_media;

/// Failure while constructing an adapter at startup.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("could not open database {url}: {message}")]
    Database { url: String, message: String },

    #[error("could not build http client: {0}")]
    Http(String),

    #[error("media root {0} is not usable: {1}")]
    MediaRoot(String, String),
}
