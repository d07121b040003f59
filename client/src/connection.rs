use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::Error;

/// App-wide connectivity state, shared by every engine. Domain rejections
/// never land here; only transport loss and session expiry do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Online,
    /// No response from the backend; presented as a blocking "disconnected"
    /// modal outside any single engine.
    Disconnected,
    /// A 401 or `unauthorized` reason was seen on any call.
    SessionExpired,
}

/// Observable connection state. Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct ConnectionMonitor {
    tx: Arc<watch::Sender<LinkState>>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LinkState::Online);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LinkState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.tx.subscribe()
    }

    /// Routes a gateway failure into app-wide state. Session expiry wins over
    /// disconnection and sticks until [`Self::reset`].
    pub fn observe(&self, error: &Error) {
        match error {
            Error::Unauthorized => {
                if self.state() != LinkState::SessionExpired {
                    info!("session expired; escalating to app-wide state");
                    self.tx.send_replace(LinkState::SessionExpired);
                }
            }
            Error::Offline(_) => {
                if self.state() == LinkState::Online {
                    info!("backend unreachable; entering disconnected state");
                    self.tx.send_replace(LinkState::Disconnected);
                }
            }
            _ => {}
        }
    }

    /// Any successful round trip clears a disconnection. Expired sessions are
    /// only cleared by re-authentication ([`Self::reset`]).
    pub fn mark_online(&self) {
        if self.state() == LinkState::Disconnected {
            self.tx.send_replace(LinkState::Online);
        }
    }

    /// Called by the authentication collaborator after a fresh sign-in.
    pub fn reset(&self) {
        self.tx.send_replace(LinkState::Online);
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn domain_errors_stay_local() {
        let monitor = ConnectionMonitor::new();
        monitor.observe(&Error::Failed(StatusCode::BAD_REQUEST));
        monitor.observe(&Error::Api {
            status: StatusCode::BAD_REQUEST,
            message: "nope".to_string(),
            reason: None,
        });
        assert_eq!(monitor.state(), LinkState::Online);
    }

    #[test]
    fn expiry_outranks_disconnection() {
        let monitor = ConnectionMonitor::new();
        monitor.observe(&Error::Unauthorized);
        assert_eq!(monitor.state(), LinkState::SessionExpired);

        // A later success does not resurrect an expired session.
        monitor.mark_online();
        assert_eq!(monitor.state(), LinkState::SessionExpired);

        monitor.reset();
        assert_eq!(monitor.state(), LinkState::Online);
    }
}
