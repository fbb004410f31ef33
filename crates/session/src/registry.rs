//! Session registry.
//!
//! The process-wide map of instance name → session: an explicit,
//! constructed object (no global state) enforcing at most one live
//! session per name. `create` reserves the name synchronously and runs
//! connection establishment in a spawned task; callers poll `get_state`
//! or subscribe through the dispatcher's sinks.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    async_trait::async_trait,
    serde::Serialize,
    tokio::sync::mpsc,
    tracing::{info, warn},
};

use {
    chatbridge_canonical::{ConnectionState, DisconnectReason},
    chatbridge_channels::{ClientCapability, Dispatcher, NativeChat, NativeGroup},
};

use crate::{
    config::{LaunchOptions, SessionConfig},
    connection::{
        EVENT_CHANNEL_CAPACITY, Session, SessionRuntime, close_session, spawn_event_loop,
    },
    error::{Error, Result},
    send::{self, OutboundRequest, SendReceipt},
};

/// Launches one native client handle per session.
///
/// The concrete implementation owns the real connection machinery
/// (browser startup, socket dial, ...); proxy and launch options come
/// from the registry's configuration, resolved once per create.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn launch(
        &self,
        instance: &str,
        launch: &LaunchOptions,
    ) -> chatbridge_channels::Result<Arc<dyn ClientCapability>>;
}

/// Connection state as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DisconnectReason>,
}

/// Pairing code plus its derived display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrCodeResponse {
    pub code: String,
    pub rendered: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub name: String,
    pub state: ConnectionState,
}

/// Per-recipient registration probe result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientCheck {
    pub id: String,
    pub exists: bool,
}

pub struct SessionRegistry {
    runtime: Arc<SessionRuntime>,
    factory: Arc<dyn ClientFactory>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn ClientFactory>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            runtime: Arc::new(SessionRuntime {
                sessions: Arc::new(RwLock::new(HashMap::new())),
                dispatcher: Arc::new(dispatcher),
                config,
            }),
            factory,
        }
    }

    /// Reserve `name` and start connecting in the background.
    ///
    /// Fails with `Conflict` while a non-closed session holds the name.
    /// Must be called from within a tokio runtime.
    pub fn create(&self, name: &str, proxy: Option<&str>) -> Result<()> {
        validate_instance_name(name)?;
        let launch = self.runtime.config.launch_for(proxy);

        let session = {
            let mut sessions = self.runtime.sessions.write().unwrap();
            if let Some(existing) = sessions.get(name) {
                if !existing.is_closed() {
                    return Err(Error::conflict(name));
                }
                // A closed entry is mid-teardown; its removal is guarded
                // by pointer identity, so replacing it here is safe.
            }
            let session = Arc::new(Session::new(name));
            sessions.insert(name.to_string(), Arc::clone(&session));
            session
        };

        info!(instance = name, proxy = ?launch.proxy, "session created, establishing");
        tokio::spawn(establish(
            Arc::clone(&self.runtime),
            Arc::clone(&self.factory),
            session,
            launch,
        ));
        Ok(())
    }

    /// Current state of a session.
    pub fn get_state(&self, name: &str) -> Result<StateSnapshot> {
        let session = self.session(name)?;
        let (state, reason) = session.state();
        Ok(StateSnapshot { state, reason })
    }

    /// Current pairing code, while one is pending.
    pub fn qr_code(&self, name: &str) -> Result<QrCodeResponse> {
        let session = self.session(name)?;
        let record = session.qr_record().ok_or_else(|| Error::no_qr(name))?;
        let rendered = record.rendered().unwrap_or_default();
        Ok(QrCodeResponse {
            code: record.code,
            rendered,
        })
    }

    /// Snapshot of all registered sessions. Safe to call concurrently
    /// with create/delete.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.runtime.sessions.read().unwrap();
        sessions
            .values()
            .map(|session| SessionSummary {
                name: session.name().to_string(),
                state: session.state().0,
            })
            .collect()
    }

    /// Tear a session down and remove it.
    ///
    /// The client's `destroy()` is awaited; its failure is reported as
    /// `Teardown` but the registry entry is removed regardless.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let session = self.session(name)?;
        info!(instance = name, "delete requested");
        close_session(&self.runtime, &session, DisconnectReason::LoggedOut)
            .await
            .map_err(|source| Error::Teardown {
                instance: name.to_string(),
                source,
            })
    }

    /// Log the account out of the network, then tear the session down.
    pub async fn logout(&self, name: &str) -> Result<()> {
        let session = self.session(name)?;
        if let Ok(client) = session.client()
            && let Err(e) = client.logout().await
        {
            warn!(instance = name, error = %e, "client logout failed");
        }
        close_session(&self.runtime, &session, DisconnectReason::LoggedOut)
            .await
            .map_err(|source| Error::Teardown {
                instance: name.to_string(),
                source,
            })
    }

    /// Run one outbound send against a session.
    pub async fn send(&self, name: &str, request: OutboundRequest) -> Result<SendReceipt> {
        let session = self.session(name)?;
        send::execute(&session, &self.runtime.dispatcher, request).await
    }

    /// Probe which of `ids` are registered recipients. Per-id lookup
    /// failures degrade to `exists: false` instead of failing the batch.
    pub async fn check_recipients(&self, name: &str, ids: &[String]) -> Result<Vec<RecipientCheck>> {
        let session = self.session(name)?;
        let client = session.client()?;
        let mut checks = Vec::with_capacity(ids.len());
        for id in ids {
            let exists = client.is_registered_recipient(id).await.unwrap_or(false);
            checks.push(RecipientCheck {
                id: id.clone(),
                exists,
            });
        }
        Ok(checks)
    }

    /// All group chats visible to the session.
    pub async fn list_groups(&self, name: &str) -> Result<Vec<NativeChat>> {
        let session = self.session(name)?;
        let client = session.client()?;
        let chats = client.list_chats().await?;
        Ok(chats.into_iter().filter(|chat| chat.is_group).collect())
    }

    /// Create a group with suffix-normalized participant ids.
    pub async fn create_group(
        &self,
        name: &str,
        subject: &str,
        participants: &[String],
    ) -> Result<NativeGroup> {
        if subject.trim().is_empty() {
            return Err(Error::validation("group subject must not be empty"));
        }
        if participants.is_empty() {
            return Err(Error::validation("group needs at least one participant"));
        }
        let normalized = participants
            .iter()
            .map(|p| send::normalize_recipient(p))
            .collect::<Result<Vec<_>>>()?;

        let session = self.session(name)?;
        let client = session.client()?;
        let group = client.create_group(subject, &normalized).await?;
        info!(instance = name, subject, "group created");
        Ok(group)
    }

    fn session(&self, name: &str) -> Result<Arc<Session>> {
        self.runtime
            .sessions
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name))
    }
}

fn validate_instance_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("instance name must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(Error::validation(
            "instance name must not contain whitespace",
        ));
    }
    Ok(())
}

/// Connection establishment, run off the `create` call path.
async fn establish(
    runtime: Arc<SessionRuntime>,
    factory: Arc<dyn ClientFactory>,
    session: Arc<Session>,
    launch: LaunchOptions,
) {
    let client = match factory.launch(session.name(), &launch).await {
        Ok(client) => client,
        Err(e) => {
            warn!(instance = session.name(), error = %e, "client launch failed");
            close_session(&runtime, &session, DisconnectReason::Disconnected)
                .await
                .ok();
            return;
        },
    };
    session.install_client(Arc::clone(&client));

    // The session may have been deleted while the client was starting.
    if session.is_closed() {
        if let Some(client) = session.take_client() {
            let _ = client.destroy().await;
        }
        return;
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    if let Err(e) = client.initialize(tx).await {
        warn!(instance = session.name(), error = %e, "client initialize failed");
        close_session(&runtime, &session, DisconnectReason::Disconnected)
            .await
            .ok();
        return;
    }
    spawn_event_loop(runtime, session, rx);
}
