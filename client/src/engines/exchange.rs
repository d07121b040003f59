use std::sync::{Arc, Mutex};

use gridfall_types::api::{ExchangeRequest, Reason};
use gridfall_types::{ExchangeQuota, ExchangeRecord};
use tracing::{debug, warn};

use super::{MSG_OFFLINE, MSG_SESSION_EXPIRED};
use crate::{ConnectionMonitor, Error, Gateway, WalletStore};

const MSG_LOAD_FAILED: &str = "Couldn't load the exchange. Pull to refresh.";
const MSG_INVALID_AMOUNT: &str = "Enter a valid number of tickets.";
const MSG_OVER_LIMIT: &str = "That's more than you can exchange right now.";
const MSG_INSUFFICIENT_COINS: &str = "Not enough coins for that exchange.";
const MSG_LIMIT_REACHED: &str = "You've reached the exchange limit for this period.";
const MSG_NOT_CONFIGURED: &str = "The exchange is temporarily unavailable.";
const MSG_GENERIC: &str = "The exchange could not be completed. Please try again.";

#[derive(Clone, Debug, Default)]
pub struct ExchangeState {
    /// Coins per ticket.
    pub rate: u64,
    pub quota: Option<ExchangeQuota>,
    pub history: Vec<ExchangeRecord>,
    pub max_tickets_possible: u64,
    pub can_exchange: bool,
    pub loaded: bool,
    pub in_flight: bool,
    pub error: Option<String>,
}

/// Converts coins into tickets under a periodic quota. No optimism: the
/// wallet only moves on a successful server response.
pub struct ExchangeEngine {
    gateway: Gateway,
    wallet: Arc<WalletStore>,
    monitor: ConnectionMonitor,
    state: Mutex<ExchangeState>,
}

fn failure_message(error: &Error) -> &'static str {
    match error {
        Error::Unauthorized => MSG_SESSION_EXPIRED,
        Error::Offline(_) => MSG_OFFLINE,
        _ => match error.reason() {
            Some(Reason::InsufficientCoins) => MSG_INSUFFICIENT_COINS,
            Some(Reason::ExchangeLimitReached) => MSG_LIMIT_REACHED,
            Some(Reason::SettingsNotConfigured) => MSG_NOT_CONFIGURED,
            _ => MSG_GENERIC,
        },
    }
}

impl ExchangeEngine {
    pub fn new(gateway: Gateway, wallet: Arc<WalletStore>, monitor: ConnectionMonitor) -> Self {
        Self {
            gateway,
            wallet,
            monitor,
            state: Mutex::new(ExchangeState::default()),
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state.lock().unwrap().clone()
    }

    fn recompute(state: &mut ExchangeState, coins: u64) {
        let remaining = state.quota.map(|q| q.remaining).unwrap_or(u64::MAX);
        state.max_tickets_possible = if state.rate == 0 {
            0
        } else {
            (coins / state.rate).min(remaining)
        };
        state.can_exchange = state.max_tickets_possible > 0;
    }

    /// Pulls quota, rate, wallet snapshot, and recent history. A failed fetch
    /// leaves all prior state untouched and only sets a loading error.
    pub async fn fetch_status(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight {
                return false;
            }
            state.in_flight = true;
        }

        let result = self.gateway.exchange_status().await;
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        match result {
            Ok(response) => {
                self.monitor.mark_online();
                self.wallet.replace(response.player_stats);
                state.rate = response.rate;
                state.quota = response.limit;
                state.history = response.history;
                state.max_tickets_possible = response.status.max_tickets_possible;
                state.can_exchange = response.status.can_exchange;
                state.loaded = true;
                state.error = None;
                true
            }
            Err(err) => {
                self.monitor.observe(&err);
                warn!(error = %err, "exchange status fetch failed");
                state.error = Some(MSG_LOAD_FAILED.to_string());
                false
            }
        }
    }

    /// Exchanges `tickets_requested` tickets' worth of coins. Local
    /// validation rejects bad amounts before any network traffic; only a
    /// request that passes every local guard reaches the backend.
    pub async fn exchange(&self, tickets_requested: u64) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight {
                return false;
            }
            if tickets_requested == 0 {
                state.error = Some(MSG_INVALID_AMOUNT.to_string());
                return false;
            }
            if !state.can_exchange || tickets_requested > state.max_tickets_possible {
                state.error = Some(MSG_OVER_LIMIT.to_string());
                return false;
            }
            state.in_flight = true;
            state.error = None;
        }

        let result = self.gateway.exchange(ExchangeRequest { tickets_requested }).await;
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        match result {
            Ok(response) => {
                self.monitor.mark_online();
                debug!(
                    tickets = response.tickets_exchanged,
                    coins_spent = response.coins_spent,
                    "exchange completed"
                );
                // No optimistic change was made; this is plain reconciliation.
                self.wallet.replace(response.player_stats);
                state.quota = response.limit;
                state.history = response.history;
                Self::recompute(&mut state, response.player_stats.coins);
                true
            }
            Err(err) => {
                self.monitor.observe(&err);
                warn!(error = %err, "exchange failed");
                state.error = Some(failure_message(&err).to_string());
                false
            }
        }
    }
}
