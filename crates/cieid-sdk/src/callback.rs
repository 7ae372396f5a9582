//! Delivery of notifications to the host.
//!
//! The host registers exactly one [`CallbackSink`]. Every notification goes
//! through a single [`NotificationDispatcher`] task, so the sink is never
//! entered from two threads at once and the lifecycle events of a run always
//! precede its terminal notification.
//!
//! ```text
//!  tag handler thread ──┐
//!                       ├──► mpsc ──► dispatcher task ──► CallbackSlot ──► sink
//!  exchange task ───────┘
//! ```
//!
//! Nothing is buffered for an absent consumer: the slot is checked when a
//! notification is sent and again when it is delivered.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::events::Event;

/// Consumer of authentication notifications.
pub trait CallbackSink: Send + Sync {
    /// A lifecycle event (currently only tag discovery).
    fn on_event(&self, event: &Event);

    /// The run failed.
    fn on_error(&self, failure: &AuthFailure);

    /// The run succeeded with the authenticated URL.
    fn on_success(&self, url: &str);
}

/// Terminal failure of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// A fault mapped onto the event taxonomy.
    Event(Event),
    /// A fault with no taxonomy entry, forwarded verbatim.
    Unmapped(String),
}

impl AuthFailure {
    /// Returns the taxonomy entry, if the fault was mapped.
    pub fn event(&self) -> Option<Event> {
        match self {
            AuthFailure::Event(event) => Some(*event),
            AuthFailure::Unmapped(_) => None,
        }
    }
}

impl std::fmt::Display for AuthFailure {
    /// The stable event name, or the verbatim message of an unmapped fault.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::Event(event) => write!(f, "{}", event),
            AuthFailure::Unmapped(message) => write!(f, "{}", message),
        }
    }
}

impl From<Event> for AuthFailure {
    fn from(event: Event) -> Self {
        AuthFailure::Event(event)
    }
}

/// A notification travelling towards the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Event(Event),
    Error(AuthFailure),
    Success(String),
}

impl Notification {
    /// Channel name used by bridge layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Event(_) => "onEvent",
            Notification::Error(_) => "onError",
            Notification::Success(_) => "onSuccess",
        }
    }

    /// Plain-text payload used by bridge layers.
    pub fn payload(&self) -> String {
        match self {
            Notification::Event(event) => event.to_string(),
            Notification::Error(failure) => failure.to_string(),
            Notification::Success(url) => url.clone(),
        }
    }

    /// Returns `true` for the error and success notifications.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Event(_))
    }

    fn deliver_to(&self, sink: &dyn CallbackSink) {
        match self {
            Notification::Event(event) => sink.on_event(event),
            Notification::Error(failure) => sink.on_error(failure),
            Notification::Success(url) => sink.on_success(url),
        }
    }
}

struct Registration {
    sink: Arc<dyn CallbackSink>,
}

/// Slot holding at most one registered sink.
#[derive(Clone, Default)]
pub struct CallbackSlot {
    inner: Arc<ArcSwapOption<Registration>>,
}

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink, replacing the previous one.
    ///
    /// Returns `true` if a sink was replaced.
    pub fn register(&self, sink: Arc<dyn CallbackSink>) -> bool {
        self.inner
            .swap(Some(Arc::new(Registration { sink })))
            .is_some()
    }

    /// Removes the registered sink.
    pub fn clear(&self) {
        self.inner.store(None);
    }

    pub fn is_registered(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Hands a notification to the registered sink.
    ///
    /// Returns `false` if no sink was registered and the notification was
    /// dropped.
    pub fn deliver(&self, notification: &Notification) -> bool {
        let Some(registration) = self.inner.load_full() else {
            tracing::debug!(kind = notification.kind(), "No callback registered, dropping notification");
            return false;
        };

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            notification.deliver_to(registration.sink.as_ref())
        }));

        if let Err(panic) = result {
            let panic_msg = panic_message(&*panic);
            tracing::error!(kind = notification.kind(), panic = %panic_msg, "Callback panicked");
        }

        true
    }
}

/// Extracts the message carried by a caught panic.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl std::fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

enum Envelope {
    Notify(Notification),
    Flush(oneshot::Sender<()>),
}

/// Single delivery context for all notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<Envelope>,
    slot: CallbackSlot,
}

impl NotificationDispatcher {
    /// Spawns the dispatcher task on the given runtime.
    pub fn spawn(slot: CallbackSlot, runtime: &Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();
        let delivery_slot = slot.clone();

        runtime.spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                match envelope {
                    Envelope::Notify(notification) => {
                        delivery_slot.deliver(&notification);
                    }
                    Envelope::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::trace!("Notification dispatcher stopped");
        });

        Self { sender, slot }
    }

    /// Queues a notification for delivery.
    ///
    /// Returns `false` if the notification was dropped because no sink is
    /// registered or the dispatcher has stopped.
    pub fn send(&self, notification: Notification) -> bool {
        if !self.slot.is_registered() {
            tracing::debug!(kind = notification.kind(), "No callback registered, dropping notification");
            return false;
        }

        self.sender.send(Envelope::Notify(notification)).is_ok()
    }

    /// Waits until every notification sent before this call was delivered.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Envelope::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn slot(&self) -> &CallbackSlot {
        &self.slot
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("slot", &self.slot)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
