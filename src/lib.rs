// src/lib.rs

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod poller;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::AuthController;
pub use client::{Client, Snapshot};
pub use config::ClientConfig;
pub use error::ClientError;
pub use poller::{PollHandle, StatusPoller};
pub use session::{Session, SessionStore};
