//! Host-facing session.
//!
//! [`CieIdSession`] is the context object a host application owns. It keeps
//! the active request, the PIN and the registered sink, and hands every card
//! presentation to the [`Orchestrator`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::runtime::Handle;

use crate::callback::{CallbackSink, CallbackSlot, NotificationDispatcher};
use crate::card::{ContactlessReader, Pin, SecureChannelSession, TransportError};
use crate::config::{CardConfig, SdkConfig};
use crate::deeplink::{AuthenticationRequest, DeepLinkError};
use crate::error::{SdkError, SdkResult};
use crate::idp::{HttpIdentityProviderClient, IdentityProviderClient};
use crate::observability;
use crate::orchestrator::{AuthState, Orchestrator, RunHandle};

/// Authentication session owned by the host.
///
/// Cloning is cheap and every clone shares the same state. Setters take
/// `&self` and the last write wins.
#[derive(Clone)]
pub struct CieIdSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    reader: Arc<dyn ContactlessReader>,
    orchestrator: Orchestrator,
    request: ArcSwapOption<AuthenticationRequest>,
    pin: ArcSwap<Pin>,
    listening: AtomicBool,
    card: CardConfig,
}

impl CieIdSession {
    /// Creates a session with explicit collaborators.
    ///
    /// The exchange and the notification dispatcher run on `runtime`.
    pub fn new(
        reader: Arc<dyn ContactlessReader>,
        idp: Arc<dyn IdentityProviderClient>,
        runtime: Handle,
    ) -> Self {
        Self::with_card_config(reader, idp, runtime, CardConfig::default())
    }

    pub fn with_card_config(
        reader: Arc<dyn ContactlessReader>,
        idp: Arc<dyn IdentityProviderClient>,
        runtime: Handle,
        card: CardConfig,
    ) -> Self {
        let dispatcher = NotificationDispatcher::spawn(CallbackSlot::new(), &runtime);
        let orchestrator = Orchestrator::new(idp, dispatcher, runtime);

        Self {
            inner: Arc::new(SessionInner {
                reader,
                orchestrator,
                request: ArcSwapOption::empty(),
                pin: ArcSwap::from_pointee(Pin::default()),
                listening: AtomicBool::new(false),
                card,
            }),
        }
    }

    /// Creates a session from configuration on the current tokio runtime.
    ///
    /// Installs the SDK log subscriber when `logging.enabled` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no tokio runtime
    /// is running.
    pub fn from_config(config: &SdkConfig, reader: Arc<dyn ContactlessReader>) -> SdkResult<Self> {
        config.validate()?;
        observability::init_tracing(&config.logging);

        let runtime = Handle::try_current().map_err(|e| SdkError::runtime(e.to_string()))?;
        let idp = HttpIdentityProviderClient::new(&config.idp)?;
        tracing::info!(endpoint = %idp.endpoint(), "CIE ID session created");

        Ok(Self::with_card_config(
            reader,
            Arc::new(idp),
            runtime,
            config.card.clone(),
        ))
    }

    /// Registers the consumer of notifications, replacing the previous one.
    pub fn start(&self, consumer: Arc<dyn CallbackSink>) {
        if self.dispatcher().slot().register(consumer) {
            tracing::debug!("Callback consumer replaced");
        }
    }

    /// Removes the registered consumer.
    pub fn stop(&self) {
        self.dispatcher().slot().clear();
    }

    /// Parses the deep link and makes it the active request.
    ///
    /// # Errors
    ///
    /// Returns the parse error. The active request is cleared in that case,
    /// so a stale request is never exchanged.
    pub fn set_request_url(&self, url: &str) -> Result<(), DeepLinkError> {
        match AuthenticationRequest::parse(url) {
            Ok(request) => {
                tracing::debug!(host = %request.host, name = %request.name, "Authentication request set");
                self.inner.request.store(Some(Arc::new(request)));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected authentication URL");
                self.inner.request.store(None);
                Err(e)
            }
        }
    }

    /// Returns the active request.
    pub fn request(&self) -> Option<Arc<AuthenticationRequest>> {
        self.inner.request.load_full()
    }

    /// Sets the PIN used by the next secure-channel open.
    pub fn set_pin(&self, pin: impl Into<Pin>) {
        self.inner.pin.store(Arc::new(pin.into()));
    }

    /// Enables tag discovery. Calling it while listening does nothing.
    pub fn start_listening(&self) -> Result<(), TransportError> {
        if self
            .inner
            .listening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        if let Err(e) = self.inner.reader.enable_discovery() {
            self.inner.listening.store(false, Ordering::Release);
            tracing::warn!(error = %e, "Failed to enable tag discovery");
            return Err(e);
        }
        tracing::debug!("Tag discovery enabled");
        Ok(())
    }

    /// Disables tag discovery. A run already in flight still completes.
    pub fn stop_listening(&self) -> Result<(), TransportError> {
        if self
            .inner
            .listening
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        if let Err(e) = self.inner.reader.disable_discovery() {
            self.inner.listening.store(true, Ordering::Release);
            tracing::warn!(error = %e, "Failed to disable tag discovery");
            return Err(e);
        }
        tracing::debug!("Tag discovery disabled");
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::Acquire)
    }

    /// Returns `true` if the device has a contactless transport.
    pub fn has_transport_feature(&self) -> bool {
        self.inner.reader.has_feature()
    }

    /// Returns `true` if the contactless transport is present and switched on.
    pub fn is_transport_enabled(&self) -> bool {
        self.inner.reader.has_feature() && self.inner.reader.is_enabled()
    }

    /// Asks the platform to show the transport settings page.
    pub fn open_transport_settings(&self) -> Result<(), TransportError> {
        self.inner.reader.open_settings()
    }

    /// Tag handler: runs one authentication for the presented card.
    ///
    /// Returns an ignored handle when discovery is off or another run is in
    /// progress.
    pub fn on_tag_discovered<S>(&self, card: &mut S) -> RunHandle
    where
        S: SecureChannelSession + ?Sized,
    {
        if !self.is_listening() {
            tracing::warn!("Tag presented while discovery is disabled, ignoring");
            return RunHandle::ignored();
        }

        let pin = self.inner.pin.load_full();
        let request = self.inner.request.load_full();
        self.inner.orchestrator.run(card, &pin, request)
    }

    pub fn state(&self) -> AuthState {
        self.inner.orchestrator.state()
    }

    /// Timeout card sessions should apply to each command.
    pub fn card_config(&self) -> &CardConfig {
        &self.inner.card
    }

    /// Waits until every notification queued so far was delivered.
    pub async fn flush_notifications(&self) {
        self.dispatcher().flush().await;
    }

    fn dispatcher(&self) -> &NotificationDispatcher {
        self.inner.orchestrator.dispatcher()
    }
}

impl std::fmt::Debug for CieIdSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CieIdSession")
            .field("state", &self.state())
            .field("listening", &self.is_listening())
            .field("request", &self.inner.request.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardCertificate;
    use crate::idp::{ExchangeError, IdpResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingReader {
        feature: bool,
        enabled: bool,
        enables: AtomicUsize,
        disables: AtomicUsize,
    }

    impl ContactlessReader for CountingReader {
        fn has_feature(&self) -> bool {
            self.feature
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn enable_discovery(&self) -> Result<(), TransportError> {
            if !self.feature {
                return Err(TransportError::Unavailable);
            }
            self.enables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn disable_discovery(&self) -> Result<(), TransportError> {
            self.disables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoIdp;

    #[async_trait]
    impl IdentityProviderClient for NoIdp {
        async fn exchange(
            &self,
            _certificate: &CardCertificate,
            _request: &AuthenticationRequest,
        ) -> Result<IdpResponse, ExchangeError> {
            Ok(IdpResponse::empty())
        }
    }

    struct PinSpy {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl SecureChannelSession for PinSpy {
        fn open_secure_channel(&mut self, pin: &Pin) -> Result<(), crate::card::CardError> {
            self.seen.lock().push(pin.expose().to_string());
            Err(crate::card::CardError::TagLost)
        }

        fn read_certificate(&mut self) -> Result<CardCertificate, crate::card::CardError> {
            Err(crate::card::CardError::TagLost)
        }
    }

    fn session(reader: Arc<CountingReader>) -> CieIdSession {
        CieIdSession::new(reader, Arc::new(NoIdp), Handle::current())
    }

    #[tokio::test]
    async fn test_listening_is_idempotent() {
        let reader = Arc::new(CountingReader {
            feature: true,
            enabled: true,
            ..Default::default()
        });
        let session = session(reader.clone());

        session.start_listening().unwrap();
        session.start_listening().unwrap();
        assert!(session.is_listening());
        assert_eq!(reader.enables.load(Ordering::SeqCst), 1);

        session.stop_listening().unwrap();
        session.stop_listening().unwrap();
        assert!(!session.is_listening());
        assert_eq!(reader.disables.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_enable_leaves_discovery_off() {
        let reader = Arc::new(CountingReader::default());
        let session = session(reader);

        assert_eq!(session.start_listening(), Err(TransportError::Unavailable));
        assert!(!session.is_listening());
    }

    #[tokio::test]
    async fn test_capability_checks() {
        let session = session(Arc::new(CountingReader {
            feature: false,
            enabled: true,
            ..Default::default()
        }));
        assert!(!session.has_transport_feature());
        assert!(!session.is_transport_enabled());

        let session = self::session(Arc::new(CountingReader {
            feature: true,
            enabled: false,
            ..Default::default()
        }));
        assert!(session.has_transport_feature());
        assert!(!session.is_transport_enabled());
        assert!(session.open_transport_settings().is_err());
    }

    #[tokio::test]
    async fn test_request_url_last_write_wins() {
        let session = session(Arc::new(CountingReader::default()));

        session
            .set_request_url("https://idp.it/OpenApp?value=first&name=n")
            .unwrap();
        session
            .set_request_url("https://idp.it/OpenApp?value=second&name=n")
            .unwrap();
        assert_eq!(session.request().unwrap().value, "second");

        assert!(session.set_request_url("https://idp.it/OpenApp?name=n").is_err());
        assert!(session.request().is_none());
    }

    #[tokio::test]
    async fn test_tag_ignored_when_not_listening() {
        let session = session(Arc::new(CountingReader {
            feature: true,
            ..Default::default()
        }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut card = PinSpy { seen: seen.clone() };

        let handle = session.on_tag_discovered(&mut card);
        assert!(handle.is_ignored());
        assert!(seen.lock().is_empty());
        assert_eq!(session.state(), AuthState::Idle);
    }

    #[tokio::test]
    async fn test_latest_pin_is_used() {
        let session = session(Arc::new(CountingReader {
            feature: true,
            ..Default::default()
        }));
        session.start_listening().unwrap();
        session
            .set_request_url("https://idp.it/OpenApp?value=v&name=n")
            .unwrap();
        session.set_pin("11111111");
        session.set_pin("12345678");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut card = PinSpy { seen: seen.clone() };
        session.on_tag_discovered(&mut card).outcome().await;

        assert_eq!(*seen.lock(), vec!["12345678".to_string()]);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let mut config = SdkConfig::default();
        config.idp.endpoint = "http://plain.example.it".to_string();

        let err = CieIdSession::from_config(&config, Arc::new(CountingReader::default()))
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
    }
}
