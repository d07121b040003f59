use serde::{Deserialize, Serialize};

/// Aggregate play statistics for one session. Accumulates monotonically and
/// resets to zero when a new session starts. Also the wire body of heartbeat
/// and end-of-session reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub games_played: u64,
    pub score: u64,
    pub coins_earned: u64,
}

/// Presence-reporting lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Ending,
}

/// Static device descriptor sent with `session/start`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: String,
    pub app_version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            platform: "web".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
