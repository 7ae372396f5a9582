//! # cieid-sdk
//!
//! Contactless authentication with the Italian electronic identity card (CIE).
//!
//! This crate provides:
//! - Parsing of the authentication-request deep link
//! - The authentication run: card discovery, secure channel, certificate read
//!   and the exchange with the CIE ID identity provider
//! - A closed event vocabulary for lifecycle and error notifications
//! - A single-consumer callback contract for the host application
//!
//! ## Overview
//!
//! A host owns a [`CieIdSession`], registers a [`CallbackSink`] with
//! [`CieIdSession::start`], sets the request URL and the PIN, and forwards
//! every presented card to [`CieIdSession::on_tag_discovered`]. Each
//! presentation ends with exactly one `on_success` or `on_error`.
//!
//! ## Modules
//!
//! - [`config`] - SDK configuration
//! - [`deeplink`] - Authentication request parsing
//! - [`card`] - Card session and reader contracts
//! - [`idp`] - Identity provider exchange
//! - [`events`] - Event vocabulary
//! - [`callback`] - Notification delivery
//! - [`orchestrator`] - Authentication run state machine
//! - [`session`] - Host-facing session
//! - [`observability`] - Log subscriber setup

pub mod callback;
pub mod card;
pub mod config;
pub mod deeplink;
pub mod error;
pub mod events;
pub mod idp;
pub mod observability;
pub mod orchestrator;
pub mod session;

pub use callback::{AuthFailure, CallbackSink, Notification};
pub use card::{
    CardCertificate, CardError, ContactlessReader, Pin, SecureChannelSession, TransportError,
};
pub use config::{CardConfig, ConfigError, IdpConfig, LoggingConfig, SdkConfig};
pub use deeplink::{AuthenticationRequest, DeepLinkError};
pub use error::{ErrorCategory, SdkError, SdkResult};
pub use events::{Event, EventFamily, UnknownEvent};
pub use idp::{ExchangeError, HttpIdentityProviderClient, IdentityProviderClient, IdpResponse};
pub use orchestrator::{AuthState, OrchestrationResult, Outcome, RunHandle};
pub use session::CieIdSession;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use cieid_sdk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::callback::{AuthFailure, CallbackSink, Notification};
    pub use crate::card::{
        CardCertificate, CardError, ContactlessReader, Pin, SecureChannelSession, TransportError,
    };
    pub use crate::config::SdkConfig;
    pub use crate::deeplink::AuthenticationRequest;
    pub use crate::error::{SdkError, SdkResult};
    pub use crate::events::Event;
    pub use crate::idp::{ExchangeError, IdentityProviderClient, IdpResponse};
    pub use crate::orchestrator::{AuthState, OrchestrationResult, RunHandle};
    pub use crate::session::CieIdSession;
}
