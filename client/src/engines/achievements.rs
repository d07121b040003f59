use std::sync::{Arc, Mutex};

use gridfall_types::api::{AchievementsQuery, Pagination};
use gridfall_types::{Achievement, AchievementStatus};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{MSG_OFFLINE, MSG_SESSION_EXPIRED};
use crate::{ConnectionMonitor, Error, Gateway, WalletStore};

const MSG_LOAD_FAILED: &str = "Couldn't load achievements. Pull to refresh.";
const MSG_NOT_CLAIMABLE: &str = "This achievement can't be claimed.";
const MSG_GENERIC: &str = "The claim could not be completed. Please try again.";

const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Clone, Debug, Default)]
pub struct AchievementState {
    pub achievements: Vec<Achievement>,
    pub pagination: Option<Pagination>,
    /// Count of entries currently claimable (status `completed`).
    pub available_count: usize,
    pub last_claimed: Option<Achievement>,
    pub loaded: bool,
    pub fetch_in_flight: bool,
    pub claim_in_flight: bool,
    pub error: Option<String>,
}

/// Progress-gated one-time reward claims.
pub struct AchievementEngine {
    gateway: Gateway,
    wallet: Arc<WalletStore>,
    monitor: ConnectionMonitor,
    state: Mutex<AchievementState>,
}

fn available_count(achievements: &[Achievement]) -> usize {
    achievements
        .iter()
        .filter(|a| a.status == AchievementStatus::Completed)
        .count()
}

impl AchievementEngine {
    pub fn new(gateway: Gateway, wallet: Arc<WalletStore>, monitor: ConnectionMonitor) -> Self {
        Self {
            gateway,
            wallet,
            monitor,
            state: Mutex::new(AchievementState::default()),
        }
    }

    pub fn state(&self) -> AchievementState {
        self.state.lock().unwrap().clone()
    }

    /// Replaces the list and pagination metadata wholesale.
    pub async fn fetch_achievements(
        &self,
        filter: Option<AchievementStatus>,
        page: u32,
    ) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.fetch_in_flight {
                return false;
            }
            state.fetch_in_flight = true;
        }

        let query = AchievementsQuery {
            page: Some(page.max(1)),
            page_size: Some(DEFAULT_PAGE_SIZE),
            status: filter,
        };
        let result = self.gateway.my_achievements(&query).await;
        let mut state = self.state.lock().unwrap();
        state.fetch_in_flight = false;
        match result {
            Ok(response) => {
                self.monitor.mark_online();
                self.wallet.replace(response.player_stats);
                state.available_count = available_count(&response.achievements);
                state.achievements = response.achievements;
                state.pagination = Some(response.meta.pagination);
                state.loaded = true;
                state.error = None;
                true
            }
            Err(err) => {
                self.monitor.observe(&err);
                warn!(error = %err, "achievement fetch failed");
                state.error = Some(MSG_LOAD_FAILED.to_string());
                false
            }
        }
    }

    /// Claims a completed achievement. Claims on entries that are missing,
    /// locked, or already claimed fail fast with no network call.
    pub async fn claim_achievement(&self, id: Uuid) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.claim_in_flight {
                return false;
            }
            let claimable = state
                .achievements
                .iter()
                .any(|a| a.id == id && a.status == AchievementStatus::Completed);
            if !claimable {
                state.error = Some(MSG_NOT_CLAIMABLE.to_string());
                return false;
            }
            state.claim_in_flight = true;
            state.error = None;
        }

        let result = self.gateway.claim_achievement(id).await;
        let mut state = self.state.lock().unwrap();
        state.claim_in_flight = false;
        match result {
            Ok(response) => {
                self.monitor.mark_online();
                self.wallet.replace(response.player_stats);
                // Patch only the matching entry; all others stay untouched.
                if let Some(entry) = state.achievements.iter_mut().find(|a| a.id == id) {
                    if entry.status.can_transition_to(AchievementStatus::Claimed) {
                        entry.status = AchievementStatus::Claimed;
                        entry.claimed_at = response.claimed_achievement.claimed_at;
                    }
                }
                state.available_count = available_count(&state.achievements);
                debug!(%id, "achievement claimed");
                state.last_claimed = Some(response.claimed_achievement);
                true
            }
            Err(err) => {
                self.monitor.observe(&err);
                warn!(error = %err, %id, "achievement claim failed");
                state.error = Some(match &err {
                    Error::Unauthorized => MSG_SESSION_EXPIRED.to_string(),
                    Error::Offline(_) => MSG_OFFLINE.to_string(),
                    // Surface the backend's own message for domain rejections.
                    Error::Api { message, .. } => message.clone(),
                    _ => MSG_GENERIC.to_string(),
                });
                false
            }
        }
    }
}
