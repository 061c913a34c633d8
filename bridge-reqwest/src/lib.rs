//! # Reqwest Bridge Implementation
//!
//! Production [`HttpClient`](bridge_traits::http::HttpClient) implementation
//! backed by `reqwest`.
//!
//! ## Overview
//!
//! The transport is deliberately dumb: it executes one request and returns
//! the response whatever its status. Status classification and retry belong
//! to the provider client, which knows which operations are idempotent and
//! how the provider signals rate limits.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_reqwest::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http: Arc<dyn bridge_traits::HttpClient> = Arc::new(ReqwestHttpClient::new());
//! ```

mod http;

pub use http::ReqwestHttpClient;
