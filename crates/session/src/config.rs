use serde::{Deserialize, Serialize};

/// Browser/launch arguments the underlying client is started with when no
/// override is configured. Mirrors what headless chat-web clients need to
/// run inside containers.
fn default_launch_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// How the native client process/browser is launched. Consulted exactly
/// once, at session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Proxy URL routed to the client, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            args: default_launch_args(),
        }
    }
}

/// Configuration for the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pairing codes a session may be issued before it is torn down.
    /// The counter resets only on successful authentication.
    pub qr_limit: u32,

    /// Bounded per-sink event queue depth in the dispatcher.
    pub sink_queue_capacity: usize,

    /// Default launch options for new sessions.
    pub launch: LaunchOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            qr_limit: 30,
            sink_queue_capacity: 64,
            launch: LaunchOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Launch options for one session, with a caller-supplied proxy taking
    /// precedence over the configured default.
    #[must_use]
    pub fn launch_for(&self, proxy_override: Option<&str>) -> LaunchOptions {
        let mut launch = self.launch.clone();
        if let Some(proxy) = proxy_override {
            launch.proxy = Some(proxy.to_string());
        }
        launch
    }
}
