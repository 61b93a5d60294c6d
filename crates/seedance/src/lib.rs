//! Generation dispatch boundary.
//!
//! [`provider`] defines the upstream-facing trait with classified
//! errors and a subscribe-style event stream; [`client`] is the
//! Seedance HTTP implementation (submit, poll, artifact fetch).

pub mod client;
pub mod provider;

pub use client::SeedanceClient;
pub use provider::{GenerationOutput, ProviderError, ProviderEvent, VideoProvider};
