use std::sync::{Arc, Mutex};

use gridfall_types::api::Reason;
use gridfall_types::{GrantedReward, Reward, SpinPhase, Wallet};
use tracing::{debug, warn};

use super::{MSG_OFFLINE, MSG_SESSION_EXPIRED};
use crate::{ConnectionMonitor, Error, Gateway, WalletStore};

const MSG_INSUFFICIENT_TICKETS: &str = "You don't have enough tickets to spin.";
const MSG_NO_REWARDS: &str = "No rewards are available right now.";
const MSG_ALL_UNIQUE: &str = "You already own every unique reward.";
const MSG_DRAW_FAILED: &str = "The reward draw failed. Please try again.";
const MSG_COSMETIC: &str = "This cosmetic reward isn't supported yet.";
const MSG_GENERIC: &str = "The spin could not be completed. Please try again.";

/// One spin transaction's state, readable by the UI between phases.
#[derive(Clone, Debug, Default)]
pub struct SpinState {
    pub phase: SpinPhase,
    pub reward: Option<Reward>,
    pub granted: Option<GrantedReward>,
    /// Authoritative wallet from the server, held back until reveal.
    pub pending_wallet: Option<Wallet>,
    pub error: Option<String>,
}

/// Reward-roulette engine: spend one ticket, obtain one reward, reveal it.
pub struct SpinEngine {
    gateway: Gateway,
    wallet: Arc<WalletStore>,
    monitor: ConnectionMonitor,
    state: Mutex<SpinState>,
}

fn failure_message(error: &Error) -> &'static str {
    match error {
        Error::Unauthorized => MSG_SESSION_EXPIRED,
        Error::Offline(_) => MSG_OFFLINE,
        _ => match error.reason() {
            Some(Reason::InsufficientTickets) => MSG_INSUFFICIENT_TICKETS,
            Some(Reason::NoRewardsAvailable) => MSG_NO_REWARDS,
            Some(Reason::AllUniqueRewardsObtained) => MSG_ALL_UNIQUE,
            Some(Reason::ProbabilitySelectionFailed) => MSG_DRAW_FAILED,
            Some(Reason::CosmeticNotImplemented) => MSG_COSMETIC,
            _ => MSG_GENERIC,
        },
    }
}

impl SpinEngine {
    pub fn new(gateway: Gateway, wallet: Arc<WalletStore>, monitor: ConnectionMonitor) -> Self {
        Self {
            gateway,
            wallet,
            monitor,
            state: Mutex::new(SpinState::default()),
        }
    }

    pub fn state(&self) -> SpinState {
        self.state.lock().unwrap().clone()
    }

    pub fn phase(&self) -> SpinPhase {
        self.state.lock().unwrap().phase
    }

    /// Runs one spin transaction. Returns false without side effects if a
    /// spin is already underway.
    ///
    /// The shared wallet is touched at most twice per call: the optimistic
    /// ticket spend here, and either the rollback below or the authoritative
    /// replace when the phase reaches `Revealed`.
    pub async fn spin(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase != SpinPhase::Idle {
                return false;
            }
            state.phase = SpinPhase::Spinning;
            state.error = None;
        }

        // Optimistic spend, floored at zero: a ticketless wallet never shows
        // a negative balance while the backend is busy rejecting the call.
        let txn = self
            .wallet
            .begin_optimistic(|w| w.tickets = w.tickets.saturating_sub(1));

        match self.gateway.spin().await {
            Ok(response) => {
                // The reward is applied when shown to the player, not when
                // earned: keep the authoritative wallet pending until reveal.
                txn.retain();
                self.monitor.mark_online();
                debug!(
                    tickets = response.player_stats.tickets,
                    reward = %response.reward.name,
                    "spin granted; awaiting reveal"
                );
                let mut state = self.state.lock().unwrap();
                state.reward = Some(response.reward);
                state.granted = Some(response.user_reward);
                state.pending_wallet = Some(response.player_stats);
                true
            }
            Err(err) => {
                txn.rollback();
                self.monitor.observe(&err);
                warn!(error = %err, "spin failed; wallet restored");
                let mut state = self.state.lock().unwrap();
                state.phase = SpinPhase::Idle;
                state.error = Some(failure_message(&err).to_string());
                false
            }
        }
    }

    /// Advances the reveal animation. Only the strict successor phase is
    /// accepted; entering `Revealed` commits the pending wallet.
    pub fn set_phase(&self, next: SpinPhase) -> bool {
        let mut state = self.state.lock().unwrap();
        if next == SpinPhase::Spinning || !state.phase.can_advance_to(next) {
            return false;
        }
        if next == SpinPhase::Revealed {
            if let Some(pending) = state.pending_wallet.take() {
                self.wallet.replace(pending);
            }
        }
        state.phase = next;
        true
    }

    /// Resets to idle once the reveal is dismissed.
    pub fn clear_current_reward(&self) {
        let mut state = self.state.lock().unwrap();
        if state.phase == SpinPhase::Spinning || state.phase == SpinPhase::Revealing {
            warn!(phase = ?state.phase, "ignoring reward clear mid-transaction");
            return;
        }
        *state = SpinState::default();
    }
}
