//! # Host Bridge Traits
//!
//! Abstraction traits that decouple the sync engine from its host environment.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync engine and the services
//! the wider application provides. Each trait represents a capability the
//! engine requires but does not own:
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport for provider APIs
//! - [`TokenCipher`](crypto::TokenCipher) - Opaque encrypt/decrypt service for
//!   stored provider credentials
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert their native errors to `BridgeError` and
//! provide actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so they can be shared
//! across async tasks behind `Arc<dyn ...>`.

pub mod crypto;
pub mod error;
pub mod http;

pub use crypto::{EncryptedSecret, TokenCipher};
pub use error::BridgeError;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
