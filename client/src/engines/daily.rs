use std::sync::{Arc, Mutex};

use gridfall_types::api::Reason;
use gridfall_types::DailyRewardDay;
use tracing::{debug, info, warn};

use super::{MSG_OFFLINE, MSG_SESSION_EXPIRED};
use crate::{ConnectionMonitor, Error, Gateway, WalletStore};

const MSG_LOAD_FAILED: &str = "Couldn't load daily rewards. Pull to refresh.";
const MSG_GENERIC: &str = "The reward could not be claimed. Please try again.";

#[derive(Clone, Debug, Default)]
pub struct DailyRewardState {
    /// The 7-day schedule, replaced wholesale on every fetch and claim.
    pub rewards: Vec<DailyRewardDay>,
    pub can_claim: bool,
    pub next_claim_at: Option<u64>,
    pub last_claimed: Option<DailyRewardDay>,
    /// Informational, not an error: today's reward was already collected.
    pub already_claimed_today: bool,
    pub loaded: bool,
    pub in_flight: bool,
    pub error: Option<String>,
}

/// Seven-day claim streak with a cooldown until the next eligibility.
pub struct DailyRewardEngine {
    gateway: Gateway,
    wallet: Arc<WalletStore>,
    monitor: ConnectionMonitor,
    state: Mutex<DailyRewardState>,
}

impl DailyRewardEngine {
    pub fn new(gateway: Gateway, wallet: Arc<WalletStore>, monitor: ConnectionMonitor) -> Self {
        Self {
            gateway,
            wallet,
            monitor,
            state: Mutex::new(DailyRewardState::default()),
        }
    }

    pub fn state(&self) -> DailyRewardState {
        self.state.lock().unwrap().clone()
    }

    pub async fn fetch_status(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight {
                return false;
            }
            state.in_flight = true;
        }

        let result = self.gateway.daily_rewards_status().await;
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        match result {
            Ok(response) => {
                self.monitor.mark_online();
                self.wallet.replace(response.player_stats);
                state.rewards = response.rewards;
                state.can_claim = response.status.can_claim;
                state.next_claim_at = response.status.next_claim_at;
                state.already_claimed_today = false;
                state.loaded = true;
                state.error = None;
                true
            }
            Err(err) => {
                self.monitor.observe(&err);
                warn!(error = %err, "daily rewards fetch failed");
                state.error = Some(MSG_LOAD_FAILED.to_string());
                false
            }
        }
    }

    /// Claims today's reward: exactly one day advances to `claimed` and the
    /// wallet takes the server value. `already_claimed_today` comes back as
    /// an informational flag rather than an error.
    pub async fn claim_reward(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight || !state.can_claim {
                return false;
            }
            state.in_flight = true;
            state.error = None;
        }

        let result = self.gateway.claim_daily_reward().await;
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        match result {
            Ok(response) => {
                self.monitor.mark_online();
                self.wallet.replace(response.player_stats);
                debug!(day = response.claimed_reward.day, "daily reward claimed");
                state.rewards = response.rewards;
                state.can_claim = response.status.can_claim;
                state.next_claim_at = response.status.next_claim_at;
                state.last_claimed = Some(response.claimed_reward);
                state.already_claimed_today = false;
                true
            }
            Err(err) => {
                if err.reason() == Some(Reason::AlreadyClaimedToday) {
                    info!("daily reward already claimed today");
                    state.already_claimed_today = true;
                    state.can_claim = false;
                    return false;
                }
                self.monitor.observe(&err);
                warn!(error = %err, "daily reward claim failed");
                state.error = Some(match &err {
                    Error::Unauthorized => MSG_SESSION_EXPIRED.to_string(),
                    Error::Offline(_) => MSG_OFFLINE.to_string(),
                    Error::Api { message, .. } => message.clone(),
                    _ => MSG_GENERIC.to_string(),
                });
                false
            }
        }
    }
}
