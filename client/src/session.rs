use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridfall_types::api::SessionStartRequest;
use gridfall_types::{DeviceInfo, SessionPhase, SessionStats};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{ConnectionMonitor, Gateway};

/// Companion stats accumulator. Gameplay code records into it; the session
/// manager reads snapshots for heartbeat and end reports. Counters only grow
/// within a session and are zeroed at each start.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    games_played: AtomicU64,
    score: AtomicU64,
    coins_earned: AtomicU64,
}

impl StatsAccumulator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_game(&self, score: u64, coins_earned: u64) {
        self.games_played.fetch_add(1, Ordering::Relaxed);
        self.score.fetch_add(score, Ordering::Relaxed);
        self.coins_earned.fetch_add(coins_earned, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            games_played: self.games_played.load(Ordering::Relaxed),
            score: self.score.load(Ordering::Relaxed),
            coins_earned: self.coins_earned.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.games_played.store(0, Ordering::Relaxed);
        self.score.store(0, Ordering::Relaxed);
        self.coins_earned.store(0, Ordering::Relaxed);
    }
}

/// Page visibility as reported by the embedding shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub session_type: String,
    pub device_info: DeviceInfo,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_type: "standard".to_string(),
            device_info: DeviceInfo::default(),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

struct SessionInner {
    phase: SessionPhase,
    visible: bool,
    heartbeat: Option<JoinHandle<()>>,
    end_attempted: bool,
}

/// Reports presence and aggregate play statistics on a heartbeat while a
/// session is active. Independent of the wallet engines; triggered by
/// authentication and visibility, never by user action.
pub struct SessionManager {
    gateway: Gateway,
    stats: Arc<StatsAccumulator>,
    monitor: ConnectionMonitor,
    config: SessionConfig,
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    pub fn new(
        gateway: Gateway,
        stats: Arc<StatsAccumulator>,
        monitor: ConnectionMonitor,
        config: SessionConfig,
    ) -> Self {
        Self {
            gateway,
            stats,
            monitor,
            config,
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Idle,
                visible: true,
                heartbeat: None,
                end_attempted: false,
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn stats(&self) -> Arc<StatsAccumulator> {
        Arc::clone(&self.stats)
    }

    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let gateway = self.gateway.clone();
        let stats = Arc::clone(&self.stats);
        let period = self.config.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let report = stats.snapshot();
                // Failures are logged only: they never surface to the user
                // and never stop the timer.
                if let Err(err) = gateway.session_heartbeat(&report).await {
                    warn!(error = %err, "heartbeat failed");
                } else {
                    debug!(games = report.games_played, "heartbeat sent");
                }
            }
        })
    }

    /// Starts a session: zeroes the stats, reports to the backend, and (if
    /// the page is visible) begins the heartbeat. A second start while one is
    /// underway or active is a no-op returning false.
    pub async fn start(&self) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Idle {
                return false;
            }
            inner.phase = SessionPhase::Starting;
            inner.end_attempted = false;
        }
        self.stats.reset();

        let request = SessionStartRequest {
            session_type: self.config.session_type.clone(),
            device_info: self.config.device_info.clone(),
        };
        match self.gateway.start_session(&request).await {
            Ok(response) => {
                self.monitor.mark_online();
                info!(session_id = %response.session_id, "session started");
                let mut inner = self.inner.lock().unwrap();
                inner.phase = SessionPhase::Active;
                if inner.visible && inner.heartbeat.is_none() {
                    inner.heartbeat = Some(self.spawn_heartbeat());
                }
                true
            }
            Err(err) => {
                self.monitor.observe(&err);
                warn!(error = %err, "session start failed");
                self.inner.lock().unwrap().phase = SessionPhase::Idle;
                false
            }
        }
    }

    /// Visibility transitions. Hiding cancels the interval timer and sends a
    /// single flush heartbeat; nothing else is sent while hidden. Becoming
    /// visible restarts the timer iff the session is still active.
    pub fn set_visibility(&self, visibility: Visibility) {
        let mut inner = self.inner.lock().unwrap();
        match visibility {
            Visibility::Hidden => {
                if !inner.visible {
                    return;
                }
                inner.visible = false;
                if let Some(handle) = inner.heartbeat.take() {
                    handle.abort();
                }
                if inner.phase == SessionPhase::Active {
                    // One flush so the backend holds the latest stats before
                    // the page goes quiet.
                    let gateway = self.gateway.clone();
                    let report = self.stats.snapshot();
                    tokio::spawn(async move {
                        if let Err(err) = gateway.session_heartbeat(&report).await {
                            warn!(error = %err, "flush heartbeat failed");
                        }
                    });
                }
            }
            Visibility::Visible => {
                if inner.visible {
                    return;
                }
                inner.visible = true;
                if inner.phase == SessionPhase::Active && inner.heartbeat.is_none() {
                    inner.heartbeat = Some(self.spawn_heartbeat());
                }
            }
        }
    }

    /// Normal teardown: awaits the final report. At most one end attempt is
    /// made per session lifecycle, across both this and [`Self::end_detached`].
    pub async fn end(&self) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Active || inner.end_attempted {
                return false;
            }
            inner.phase = SessionPhase::Ending;
            inner.end_attempted = true;
            if let Some(handle) = inner.heartbeat.take() {
                handle.abort();
            }
        }

        let report = self.stats.snapshot();
        if let Err(err) = self.gateway.end_session(&report).await {
            self.monitor.observe(&err);
            warn!(error = %err, "session end report failed");
        }
        self.inner.lock().unwrap().phase = SessionPhase::Idle;
        true
    }

    /// Unload-path teardown: dispatches the final report over the keepalive
    /// transport and returns without awaiting a response.
    pub fn end_detached(&self) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Active || inner.end_attempted {
                return false;
            }
            inner.end_attempted = true;
            inner.phase = SessionPhase::Idle;
            if let Some(handle) = inner.heartbeat.take() {
                handle.abort();
            }
        }

        let report = self.stats.snapshot();
        match serde_json::to_value(report) {
            Ok(body) => self.gateway.send_keepalive("session/end", body),
            Err(err) => warn!(error = %err, "end report could not be encoded"),
        }
        true
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let Ok(inner) = self.inner.get_mut() else {
            return;
        };
        if let Some(handle) = inner.heartbeat.take() {
            handle.abort();
        }
        // Best-effort end for a manager dropped mid-session, when a runtime
        // is still around to carry the keepalive.
        if inner.phase == SessionPhase::Active
            && !inner.end_attempted
            && tokio::runtime::Handle::try_current().is_ok()
        {
            inner.end_attempted = true;
            let report = self.stats.snapshot();
            if let Ok(body) = serde_json::to_value(report) {
                self.gateway.send_keepalive("session/end", body);
            }
        }
    }
}
