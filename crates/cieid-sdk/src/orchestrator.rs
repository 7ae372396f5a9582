//! Authentication run state machine.
//!
//! One presented card drives one run:
//!
//! ```text
//! Idle ─► TagPresented ─► SecureChannelOpening ─► CertificateRead ─► ExchangeInFlight ─► Terminal
//!              │                   │                     │                   │
//!              └───────────────────┴─────────────────────┴───────────────────┴──► Terminal(Failure)
//! ```
//!
//! The card phase runs on the caller's thread. The identity provider exchange
//! is spawned on the runtime, so the tag handler returns as soon as the
//! certificate is read. Every run ends with exactly one terminal
//! notification, and no fault is retried.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use regex::Regex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::callback::{AuthFailure, Notification, NotificationDispatcher, panic_message};
use crate::card::{CardError, Pin, SecureChannelSession};
use crate::deeplink::AuthenticationRequest;
use crate::events::Event;
use crate::idp::{ExchangeError, IdentityProviderClient, IdpResponse, TlsAlert};

static ONE_TIME_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{16}$").expect("valid one-time code pattern"));

/// How a finished run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Position of the current run in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    TagPresented,
    SecureChannelOpening,
    CertificateRead,
    ExchangeInFlight,
    Terminal(Outcome),
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Idle => "idle",
            AuthState::TagPresented => "tag_presented",
            AuthState::SecureChannelOpening => "secure_channel_opening",
            AuthState::CertificateRead => "certificate_read",
            AuthState::ExchangeInFlight => "exchange_in_flight",
            AuthState::Terminal(Outcome::Success) => "terminal_success",
            AuthState::Terminal(Outcome::Failure) => "terminal_failure",
        }
    }

    /// Returns `true` while a run is between discovery and its terminal state.
    pub fn is_running(&self) -> bool {
        !matches!(self, AuthState::Idle | AuthState::Terminal(_))
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationResult {
    /// The authenticated URL.
    Success(String),
    /// A fault mapped onto the event taxonomy.
    Failed(Event),
    /// A fault with no taxonomy entry.
    Unmapped(String),
}

impl OrchestrationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OrchestrationResult::Success(_))
    }

    /// The terminal notification announcing this result.
    pub fn notification(&self) -> Notification {
        match self {
            OrchestrationResult::Success(url) => Notification::Success(url.clone()),
            OrchestrationResult::Failed(event) => Notification::Error(AuthFailure::Event(*event)),
            OrchestrationResult::Unmapped(message) => {
                Notification::Error(AuthFailure::Unmapped(message.clone()))
            }
        }
    }

    fn outcome(&self) -> Outcome {
        if self.is_success() {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

impl From<AuthFailure> for OrchestrationResult {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Event(event) => OrchestrationResult::Failed(event),
            AuthFailure::Unmapped(message) => OrchestrationResult::Unmapped(message),
        }
    }
}

/// Maps a card fault onto the taxonomy.
pub fn classify_card_error(err: &CardError) -> AuthFailure {
    match err {
        CardError::NotRecognizedCard => AuthFailure::Event(Event::NotRecognizedCard),
        CardError::TagLost => AuthFailure::Event(Event::TagLost),
        CardError::PinRejected {
            attempts_remaining: 0,
        } => AuthFailure::Event(Event::CardLocked),
        CardError::PinRejected { attempts_remaining } => AuthFailure::Event(Event::PinError {
            attempts_remaining: *attempts_remaining,
        }),
        CardError::PinLocked => AuthFailure::Event(Event::CardLocked),
        CardError::Other(message) => AuthFailure::Unmapped(message.clone()),
    }
}

/// Maps an exchange fault onto the taxonomy.
pub fn classify_exchange_error(err: &ExchangeError) -> AuthFailure {
    match err {
        ExchangeError::Timeout(_) | ExchangeError::Unreachable(_) => {
            AuthFailure::Event(Event::NoInternetConnection)
        }
        ExchangeError::Tls(_) => match err.tls_alert() {
            Some(TlsAlert::CertificateExpired) => AuthFailure::Event(Event::CertificateExpired),
            Some(TlsAlert::CertificateRevoked) => AuthFailure::Event(Event::CertificateRevoked),
            None => AuthFailure::Unmapped(err.to_string()),
        },
        ExchangeError::Other(_) => AuthFailure::Unmapped(err.to_string()),
    }
}

/// Returns `true` if the code is exactly 16 ASCII digits.
pub fn is_valid_one_time_code(code: &str) -> bool {
    ONE_TIME_CODE.is_match(code)
}

/// Turns the exchange result into the terminal result of the run.
pub fn complete_exchange(
    result: Result<IdpResponse, ExchangeError>,
    request: &AuthenticationRequest,
) -> OrchestrationResult {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "Identity provider exchange failed");
            return classify_exchange_error(&err).into();
        }
    };

    match response.one_time_code() {
        None => OrchestrationResult::Failed(Event::AuthenticationError),
        Some(code) if is_valid_one_time_code(code) => {
            OrchestrationResult::Success(request.success_url(code))
        }
        Some(code) => {
            tracing::warn!(code_len = code.len(), "Identity provider returned a malformed one-time code");
            OrchestrationResult::Failed(Event::GeneralError)
        }
    }
}

/// Runs one card call, turning a fault or a panic into the run's result.
fn card_step<T>(
    step: &'static str,
    call: impl FnOnce() -> Result<T, CardError>,
) -> Result<T, OrchestrationResult> {
    match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::warn!(step, error = %err, "Card operation failed");
            Err(classify_card_error(&err).into())
        }
        Err(panic) => {
            let message = panic_message(&*panic);
            tracing::error!(step, panic = %message, "Card session panicked");
            Err(OrchestrationResult::Unmapped(message))
        }
    }
}

/// Handle to a run started by [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunHandle {
    inner: RunInner,
}

#[derive(Debug)]
enum RunInner {
    Ignored,
    Finished(OrchestrationResult),
    InFlight(JoinHandle<OrchestrationResult>),
}

impl RunHandle {
    pub(crate) fn ignored() -> Self {
        Self {
            inner: RunInner::Ignored,
        }
    }

    /// Returns `true` if the presentation did not start a run.
    pub fn is_ignored(&self) -> bool {
        matches!(self.inner, RunInner::Ignored)
    }

    /// Returns `true` while the exchange is still running.
    pub fn is_pending(&self) -> bool {
        matches!(&self.inner, RunInner::InFlight(handle) if !handle.is_finished())
    }

    /// Waits for the run to end.
    ///
    /// Returns `None` if the presentation was ignored. Dropping the handle
    /// instead does not cancel the run.
    pub async fn outcome(self) -> Option<OrchestrationResult> {
        match self.inner {
            RunInner::Ignored => None,
            RunInner::Finished(result) => Some(result),
            RunInner::InFlight(handle) => Some(
                handle
                    .await
                    .unwrap_or_else(|e| OrchestrationResult::Unmapped(e.to_string())),
            ),
        }
    }
}

/// Drives authentication runs.
#[derive(Clone)]
pub struct Orchestrator {
    idp: Arc<dyn IdentityProviderClient>,
    dispatcher: NotificationDispatcher,
    runtime: Handle,
    state: Arc<Mutex<AuthState>>,
}

impl Orchestrator {
    pub fn new(
        idp: Arc<dyn IdentityProviderClient>,
        dispatcher: NotificationDispatcher,
        runtime: Handle,
    ) -> Self {
        Self {
            idp,
            dispatcher,
            runtime,
            state: Arc::new(Mutex::new(AuthState::Idle)),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock()
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Runs one card presentation.
    ///
    /// A presentation arriving while another run is in progress is ignored.
    pub fn run<S>(
        &self,
        card: &mut S,
        pin: &Pin,
        request: Option<Arc<AuthenticationRequest>>,
    ) -> RunHandle
    where
        S: SecureChannelSession + ?Sized,
    {
        {
            let mut state = self.state.lock();
            if state.is_running() {
                tracing::warn!(state = %*state, "Tag presented while a run is in progress, ignoring");
                return RunHandle::ignored();
            }
            *state = AuthState::TagPresented;
        }
        tracing::debug!(state = %AuthState::TagPresented, "Tag discovered");
        self.dispatcher
            .send(Notification::Event(Event::TagDiscovered));

        let Some(request) = request else {
            tracing::warn!("No authentication request set, card left untouched");
            return self.finish_now(OrchestrationResult::Failed(Event::GeneralError));
        };

        self.transition(AuthState::SecureChannelOpening);
        if let Err(result) = card_step("open secure channel", || card.open_secure_channel(pin)) {
            return self.finish_now(result);
        }

        let certificate = match card_step("read certificate", || card.read_certificate()) {
            Ok(certificate) => certificate,
            Err(result) => return self.finish_now(result),
        };
        self.transition(AuthState::CertificateRead);

        self.transition(AuthState::ExchangeInFlight);
        let this = self.clone();
        let handle = self.runtime.spawn(async move {
            let idp = this.idp.clone();
            let exchange_request = request.clone();
            // Own task so a panicking client still ends the run
            let exchange = tokio::spawn(async move {
                idp.exchange(&certificate, &exchange_request).await
            });
            let result = match exchange.await {
                Ok(result) => complete_exchange(result, &request),
                Err(e) => OrchestrationResult::Unmapped(e.to_string()),
            };
            this.finish(result)
        });

        RunHandle {
            inner: RunInner::InFlight(handle),
        }
    }

    fn transition(&self, next: AuthState) {
        *self.state.lock() = next;
        tracing::debug!(state = %next, "Authentication state changed");
    }

    fn finish_now(&self, result: OrchestrationResult) -> RunHandle {
        RunHandle {
            inner: RunInner::Finished(self.finish(result)),
        }
    }

    fn finish(&self, result: OrchestrationResult) -> OrchestrationResult {
        match &result {
            OrchestrationResult::Success(_) => tracing::info!("Authentication succeeded"),
            OrchestrationResult::Failed(event) => {
                tracing::warn!(event = %event, "Authentication failed")
            }
            OrchestrationResult::Unmapped(message) => {
                tracing::warn!(error = %message, "Authentication failed with unmapped error")
            }
        }

        // Notify before leaving the running state so a new run cannot overtake
        self.dispatcher.send(result.notification());
        self.transition(AuthState::Terminal(result.outcome()));
        result
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
