//! Test doubles shared across the session crate's unit tests: a scripted
//! client capability, a client factory producing them, and recording sinks.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, tokio::sync::mpsc};

use {
    chatbridge_canonical::{CanonicalEvent, CanonicalMessageEnvelope},
    chatbridge_channels::{
        ClientCapability, EventSink, MediaPayload, NativeChat, NativeEvent, NativeGroup,
        NativeMessage, PersistenceSink, SinkScope,
    },
};

use crate::{config::LaunchOptions, registry::ClientFactory};

/// Scripted in-memory client. Tests drive it by calling [`MockClient::emit`]
/// and inspect the calls the pipeline made against it.
pub(crate) struct MockClient {
    events: Mutex<Option<mpsc::Sender<NativeEvent>>>,
    seq: AtomicUsize,
    pub registered: AtomicBool,
    pub fail_destroy: AtomicBool,
    pub fail_check: AtomicBool,
    pub fail_contact_lookup: AtomicBool,
    pub destroy_calls: AtomicUsize,
    pub check_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub sent_text: Mutex<Vec<(String, String)>>,
    pub sent_media: Mutex<Vec<(String, MediaPayload, Option<String>)>>,
    pub display_names: Mutex<HashMap<String, String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(None),
            seq: AtomicUsize::new(0),
            registered: AtomicBool::new(true),
            fail_destroy: AtomicBool::new(false),
            fail_check: AtomicBool::new(false),
            fail_contact_lookup: AtomicBool::new(false),
            destroy_calls: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            sent_text: Mutex::new(Vec::new()),
            sent_media: Mutex::new(Vec::new()),
            display_names: Mutex::new(HashMap::new()),
        }
    }

    /// Push a native event into the session's channel. Returns `false`
    /// once the session stopped listening.
    pub async fn emit(&self, event: NativeEvent) -> bool {
        let tx = self.events.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn initialized(&self) -> bool {
        self.events.lock().unwrap().is_some()
    }

    fn ack(&self, to: &str, body: &str, mime_type: Option<String>) -> NativeMessage {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        NativeMessage {
            id: format!("OUT-{n}"),
            remote_id: to.to_string(),
            from_me: true,
            body: body.to_string(),
            timestamp: 1_700_000_100.0,
            mime_type,
        }
    }
}

#[async_trait]
impl ClientCapability for MockClient {
    async fn initialize(&self, events: mpsc::Sender<NativeEvent>) -> chatbridge_channels::Result<()> {
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn destroy(&self) -> chatbridge_channels::Result<()> {
        self.destroy_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_destroy.load(Ordering::Relaxed) {
            return Err(chatbridge_channels::Error::unavailable(
                "browser already gone",
            ));
        }
        Ok(())
    }

    async fn logout(&self) -> chatbridge_channels::Result<()> {
        Ok(())
    }

    async fn is_registered_recipient(&self, _recipient: &str) -> chatbridge_channels::Result<bool> {
        self.check_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_check.load(Ordering::Relaxed) {
            return Err(chatbridge_channels::Error::unavailable("lookup timed out"));
        }
        Ok(self.registered.load(Ordering::Relaxed))
    }

    async fn send_text(&self, to: &str, text: &str) -> chatbridge_channels::Result<NativeMessage> {
        self.send_calls.fetch_add(1, Ordering::Relaxed);
        self.sent_text
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(self.ack(to, text, None))
    }

    async fn send_media(
        &self,
        to: &str,
        payload: MediaPayload,
        caption: Option<&str>,
    ) -> chatbridge_channels::Result<NativeMessage> {
        self.send_calls.fetch_add(1, Ordering::Relaxed);
        let mime = payload.mime_tag();
        self.sent_media.lock().unwrap().push((
            to.to_string(),
            payload,
            caption.map(str::to_string),
        ));
        Ok(self.ack(to, caption.unwrap_or_default(), Some(mime)))
    }

    async fn send_voice_note(
        &self,
        to: &str,
        payload: MediaPayload,
    ) -> chatbridge_channels::Result<NativeMessage> {
        self.send_calls.fetch_add(1, Ordering::Relaxed);
        let mime = payload.mime_tag();
        self.sent_media
            .lock()
            .unwrap()
            .push((to.to_string(), payload, None));
        Ok(self.ack(to, "", Some(mime)))
    }

    async fn list_chats(&self) -> chatbridge_channels::Result<Vec<NativeChat>> {
        Ok(vec![
            NativeChat {
                id: "team@g.us".into(),
                name: "Team".into(),
                is_group: true,
            },
            NativeChat {
                id: "5511999999999@c.us".into(),
                name: "Ana".into(),
                is_group: false,
            },
        ])
    }

    async fn create_group(
        &self,
        subject: &str,
        participants: &[String],
    ) -> chatbridge_channels::Result<NativeGroup> {
        Ok(NativeGroup {
            id: "fresh@g.us".into(),
            subject: subject.to_string(),
            participants: participants.to_vec(),
        })
    }

    async fn contact_display_name(
        &self,
        id: &str,
    ) -> chatbridge_channels::Result<Option<String>> {
        if self.fail_contact_lookup.load(Ordering::Relaxed) {
            return Err(chatbridge_channels::Error::unavailable("contact fetch timed out"));
        }
        Ok(self.display_names.lock().unwrap().get(id).cloned())
    }
}

/// Factory handing out one fresh [`MockClient`] per launch.
pub(crate) struct MockFactory {
    pub built: Mutex<Vec<Arc<MockClient>>>,
    pub fail_launch: AtomicBool,
    pub launches: Mutex<Vec<(String, LaunchOptions)>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            built: Mutex::new(Vec::new()),
            fail_launch: AtomicBool::new(false),
            launches: Mutex::new(Vec::new()),
        })
    }

    /// Wait for launch number `idx` to complete client initialization.
    pub async fn client(&self, idx: usize) -> Arc<MockClient> {
        wait_until(|| {
            self.built
                .lock()
                .unwrap()
                .get(idx)
                .is_some_and(|c| c.initialized())
        })
        .await;
        Arc::clone(&self.built.lock().unwrap()[idx])
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn launch(
        &self,
        instance: &str,
        launch: &LaunchOptions,
    ) -> chatbridge_channels::Result<Arc<dyn ClientCapability>> {
        self.launches
            .lock()
            .unwrap()
            .push((instance.to_string(), launch.clone()));
        if self.fail_launch.load(Ordering::Relaxed) {
            return Err(chatbridge_channels::Error::unavailable(
                "browser failed to start",
            ));
        }
        let client = Arc::new(MockClient::new());
        self.built.lock().unwrap().push(Arc::clone(&client));
        Ok(client)
    }
}

pub(crate) struct RecordingSink {
    pub name: &'static str,
    pub scope: SinkScope,
    pub tx: mpsc::UnboundedSender<CanonicalEvent>,
}

pub(crate) fn recording_sink(
    name: &'static str,
    scope: SinkScope,
) -> (Arc<RecordingSink>, mpsc::UnboundedReceiver<CanonicalEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingSink { name, scope, tx }), rx)
}

#[async_trait]
impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        self.name
    }

    fn scope(&self) -> SinkScope {
        self.scope
    }

    async fn deliver(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        self.tx.send(event.clone()).ok();
        Ok(())
    }
}

pub(crate) struct RecordingStore {
    pub tx: mpsc::UnboundedSender<(String, CanonicalMessageEnvelope)>,
}

pub(crate) fn recording_store() -> (
    Arc<RecordingStore>,
    mpsc::UnboundedReceiver<(String, CanonicalMessageEnvelope)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingStore { tx }), rx)
}

#[async_trait]
impl PersistenceSink for RecordingStore {
    async fn store(
        &self,
        instance: &str,
        envelope: &CanonicalMessageEnvelope,
    ) -> anyhow::Result<()> {
        self.tx.send((instance.to_string(), envelope.clone())).ok();
        Ok(())
    }
}

/// Poll `cond` until it holds, panicking after one second.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}

/// Receive the next recorded event, panicking after one second.
pub(crate) async fn recv_event(rx: &mut mpsc::UnboundedReceiver<CanonicalEvent>) -> CanonicalEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| panic!("no event within 1s"))
}

/// Assert nothing arrives on `rx` for a short window.
pub(crate) async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<CanonicalEvent>) {
    let outcome = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected event: {outcome:?}");
}
