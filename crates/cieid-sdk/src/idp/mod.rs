//! Identity provider exchange.
//!
//! This module provides:
//!
//! - [`IdentityProviderClient`] - the exchange contract used by the orchestrator
//! - [`HttpIdentityProviderClient`] - reqwest-based implementation
//! - [`ExchangeError`] - closed set of exchange failures

pub mod client;
pub mod error;

pub use client::{HttpIdentityProviderClient, IdentityProviderClient, IdpResponse};
pub use error::{CERTIFICATE_EXPIRED_ALERT, CERTIFICATE_REVOKED_ALERT, ExchangeError, TlsAlert};
