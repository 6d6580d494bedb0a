//! Error types for wgpanel.
//!
//! This module defines the [`enum@Error`] enum and [`Result`] type alias used at
//! the construction and teardown seams of the library.
//!
//! Store operations never return [`enum@Error`]. A failed remote call is
//! represented as data by [`ApiError`](crate::api::ApiError), turned into a
//! [`Notification`](crate::Notification), and surfaced to the caller only as a
//! `false`/`None` return value.
//!
//! # Error Categories
//!
//! - [`Error::Config`] - Invalid configuration values
//! - [`Error::Client`] - The HTTP client could not be built
//! - [`Error::Io`] - Local file operations (e.g. writing a peer config)
//! - [`Error::Shutdown`] - Operation on a shut down panel
//!
//! # Example
//!
//! ```rust
//! use wgpanel::{Config, Error, Panel};
//!
//! match Panel::new(Config::new("not a url")) {
//!     Ok(_) => println!("panel ready"),
//!     Err(Error::Config(msg)) => eprintln!("bad configuration: {msg}"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! ```

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for wgpanel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or tearing down the panel
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(Arc<str>),

    /// Failed to build the HTTP client
    #[error("client error: {0}")]
    Client(Arc<str>),

    /// Local I/O failed
    #[error("i/o error: {0}")]
    Io(Arc<str>),

    /// The panel has been shut down
    #[error("panel has been shut down")]
    Shutdown,
}

impl Error {
    /// Create a configuration error
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(Arc::from(msg.into()))
    }

    /// Create a client error
    #[inline]
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(Arc::from(msg.into()))
    }

    /// Create an i/o error
    #[inline]
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(Arc::from(msg.into()))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
