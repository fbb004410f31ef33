//! Per-session connection state machine.
//!
//! Each session owns a consumer loop over its client's native event
//! channel, which is what guarantees in-order processing within one
//! instance: qr → authenticated → ready never reorder, and inbound
//! messages keep their arrival order. Every terminal cause funnels into
//! one teardown routine, so registry cleanup is single-pathed no matter
//! why a session dies.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    chatbridge_canonical::{
        CanonicalEvent, ConnectionState, DisconnectReason, EventPayload, epoch_now,
    },
    chatbridge_channels::{ClientCapability, Dispatcher, NativeEvent, NativeMessage},
};

use crate::{config::SessionConfig, normalize, qr::{self, QrRecord}};

/// Depth of the per-session native event channel. The event loop is the
/// sole consumer; the client blocks briefly on a full channel rather than
/// reordering.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared map of live sessions, keyed by instance name. Never held across
/// an await point.
pub(crate) type SessionMap = Arc<RwLock<HashMap<String, Arc<Session>>>>;

/// Everything the event loops and the registry share.
pub(crate) struct SessionRuntime {
    pub sessions: SessionMap,
    pub dispatcher: Arc<Dispatcher>,
    pub config: SessionConfig,
}

/// Mutable lifecycle state, guarded by the session's lock.
struct LifecycleState {
    state: ConnectionState,
    reason: Option<DisconnectReason>,
    qr: Option<QrRecord>,
}

/// One instance's full lifecycle state, including its bound client handle.
///
/// The client handle is exclusively owned here: it is installed once when
/// establishment succeeds and taken out exactly once during teardown.
pub struct Session {
    name: String,
    created_at: i64,
    client: RwLock<Option<Arc<dyn ClientCapability>>>,
    cancel: CancellationToken,
    lifecycle: RwLock<LifecycleState>,
}

impl Session {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: epoch_now(),
            client: RwLock::new(None),
            cancel: CancellationToken::new(),
            lifecycle: RwLock::new(LifecycleState {
                state: ConnectionState::Initializing,
                reason: None,
                qr: None,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Current connection state plus close reason, if terminal.
    #[must_use]
    pub fn state(&self) -> (ConnectionState, Option<DisconnectReason>) {
        let lifecycle = self.lifecycle.read().unwrap();
        (lifecycle.state, lifecycle.reason)
    }

    /// Current pairing record, while one is pending.
    #[must_use]
    pub fn qr_record(&self) -> Option<QrRecord> {
        self.lifecycle.read().unwrap().qr.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.read().unwrap().state == ConnectionState::Closed
    }

    /// The bound client handle, or `Unavailable` while establishment is
    /// still in flight.
    pub(crate) fn client(&self) -> chatbridge_channels::Result<Arc<dyn ClientCapability>> {
        self.client
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| chatbridge_channels::Error::unavailable("session not connected yet"))
    }

    pub(crate) fn install_client(&self, client: Arc<dyn ClientCapability>) {
        *self.client.write().unwrap() = Some(client);
    }

    pub(crate) fn take_client(&self) -> Option<Arc<dyn ClientCapability>> {
        self.client.write().unwrap().take()
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// First transition into `Closed` wins; later callers observe `false`
    /// and skip teardown.
    fn transition_closed(&self, reason: DisconnectReason) -> bool {
        let mut lifecycle = self.lifecycle.write().unwrap();
        if lifecycle.state == ConnectionState::Closed {
            return false;
        }
        lifecycle.state = ConnectionState::Closed;
        lifecycle.reason = Some(reason);
        true
    }

    fn set_state(&self, state: ConnectionState) {
        self.lifecycle.write().unwrap().state = state;
    }

    fn set_authenticated(&self) {
        let mut lifecycle = self.lifecycle.write().unwrap();
        lifecycle.state = ConnectionState::Authenticated;
        // Issue budget resets exactly here, and only here — never on
        // disconnect, so reconnect churn keeps accumulating.
        lifecycle.qr = None;
    }

    /// Apply one QR issuance and return the updated record plus the
    /// one-shot exceeded flag.
    fn record_qr(&self, code: &str, limit: u32) -> (QrRecord, bool) {
        let mut lifecycle = self.lifecycle.write().unwrap();
        let (record, exceeded) = qr::record_issuance(lifecycle.qr.as_ref(), code, epoch_now(), limit);
        lifecycle.qr = Some(record.clone());
        if lifecycle.state == ConnectionState::Initializing {
            lifecycle.state = ConnectionState::QrPending;
        }
        (record, exceeded)
    }
}

/// Consume the session's native event stream until the session closes.
pub(crate) fn spawn_event_loop(
    runtime: Arc<SessionRuntime>,
    session: Arc<Session>,
    mut events: mpsc::Receiver<NativeEvent>,
) {
    let cancel = session.cancellation();
    tokio::spawn(async move {
        debug!(instance = session.name(), "event loop started");
        loop {
            tokio::select! {
                // Teardown is a hard cancellation: in-flight events still
                // in the channel are discarded, never replayed into a
                // half-destroyed client handle.
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => handle_native_event(&runtime, &session, event).await,
                    None => {
                        // Client dropped its sender without a disconnect
                        // signal; treat it as one.
                        close_session(&runtime, &session, DisconnectReason::Disconnected)
                            .await
                            .ok();
                        break;
                    },
                },
            }
        }
        debug!(instance = session.name(), "event loop stopped");
    });
}

async fn handle_native_event(
    runtime: &Arc<SessionRuntime>,
    session: &Arc<Session>,
    event: NativeEvent,
) {
    match event {
        NativeEvent::Qr { code } => {
            let limit = runtime.config.qr_limit;
            let (record, exceeded) = session.record_qr(&code, limit);
            info!(
                instance = session.name(),
                count = record.issue_count,
                "pairing code issued"
            );
            runtime.dispatcher.publish(&CanonicalEvent::new(
                session.name(),
                EventPayload::QrcodeUpdated {
                    rendered: record.rendered().unwrap_or_default(),
                    code: record.code,
                },
            ));
            if exceeded {
                warn!(instance = session.name(), limit, "QR issuance limit exceeded");
                close_session(runtime, session, DisconnectReason::QrLimitExceeded)
                    .await
                    .ok();
            }
        },
        NativeEvent::Authenticated => {
            info!(instance = session.name(), "authenticated");
            session.set_authenticated();
        },
        NativeEvent::AuthFailure { message } => {
            warn!(instance = session.name(), message, "authentication failed");
            close_session(runtime, session, DisconnectReason::AuthFailure)
                .await
                .ok();
        },
        NativeEvent::Ready => {
            info!(instance = session.name(), "connection open");
            session.set_state(ConnectionState::Open);
            runtime.dispatcher.publish(&CanonicalEvent::new(
                session.name(),
                EventPayload::ConnectionUpdate {
                    state: ConnectionState::Open,
                    reason: None,
                },
            ));
        },
        NativeEvent::Disconnected { reason } => {
            warn!(instance = session.name(), reason, "disconnected");
            close_session(runtime, session, DisconnectReason::Disconnected)
                .await
                .ok();
        },
        NativeEvent::Message(native) => {
            let (state, _) = session.state();
            if state != ConnectionState::Open {
                debug!(
                    instance = session.name(),
                    ?state,
                    "ignoring inbound message outside OPEN"
                );
                return;
            }
            handle_inbound_message(runtime, session, native).await;
        },
    }
}

/// Normalize one inbound message and fan it out. Failures here are
/// contained: they never change connection state or escape the loop.
async fn handle_inbound_message(
    runtime: &Arc<SessionRuntime>,
    session: &Arc<Session>,
    native: NativeMessage,
) {
    let display_name = match session.client() {
        Ok(client) => normalize::resolve_display_name(client.as_ref(), &native.remote_id).await,
        Err(_) => String::new(),
    };
    let envelope = normalize::inbound(&native, display_name);
    debug!(
        instance = session.name(),
        native_id = %envelope.key.native_id,
        "inbound message normalized"
    );
    runtime.dispatcher.persist(session.name(), &envelope);
    runtime.dispatcher.publish(&CanonicalEvent::new(
        session.name(),
        EventPayload::MessagesUpsert {
            messages: vec![envelope],
        },
    ));
}

/// The single teardown routine for every terminal cause.
///
/// Emits exactly one `CONNECTION_UPDATE{closed}` (first close wins),
/// cancels future event processing, awaits the client's `destroy()`, and
/// removes the session from the registry map — in that order, on every
/// path, including `destroy()` failure.
pub(crate) async fn close_session(
    runtime: &Arc<SessionRuntime>,
    session: &Arc<Session>,
    reason: DisconnectReason,
) -> chatbridge_channels::Result<()> {
    if !session.transition_closed(reason) {
        return Ok(());
    }
    info!(instance = session.name(), ?reason, "closing session");

    runtime.dispatcher.publish(&CanonicalEvent::new(
        session.name(),
        EventPayload::ConnectionUpdate {
            state: ConnectionState::Closed,
            reason: Some(reason),
        },
    ));

    session.cancel.cancel();

    let result = match session.take_client() {
        Some(client) => client.destroy().await,
        None => Ok(()),
    };
    if let Err(e) = &result {
        warn!(instance = session.name(), error = %e, "client destroy failed during teardown");
    }

    // Remove only our own entry: a replacement session may already have
    // been registered under the same name.
    {
        let mut sessions = runtime.sessions.write().unwrap();
        if sessions
            .get(session.name())
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            sessions.remove(session.name());
        }
    }
    info!(instance = session.name(), "session removed");
    result
}
