//! Liveness probe client for the Ray Serve proxy actor
//!
//! RayService marks a pod as a serving endpoint only while the proxy actor on
//! it answers its health endpoint with 200.

#![deny(missing_docs)]

pub mod client;
pub mod error;

pub use client::{HttpProxyClient, RayHttpProxyClient, PROBE_TIMEOUT};
pub use error::ProxyError;
