use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shared balance record for one player.
///
/// Unsigned fields make the non-negativity invariant structural: no commit or
/// rollback path can ever store a negative balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub coins: u64,
    pub tickets: u64,
}

impl Wallet {
    pub fn new(coins: u64, tickets: u64) -> Self {
        Self { coins, tickets }
    }
}

/// What a reward pays out in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Coins,
    Tickets,
    Cosmetic,
}

/// A reward definition from the backend catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    pub kind: RewardKind,
    pub amount: u64,
}

/// One reward instance granted to the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedReward {
    pub id: Uuid,
    pub reward_id: Uuid,
    pub granted_at: u64,
}

/// Lifecycle of one spin transaction. Strictly sequential; `Idle` is both the
/// initial and the terminal phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpinPhase {
    #[default]
    Idle,
    Spinning,
    Revealing,
    Revealed,
}

impl SpinPhase {
    /// Whether `next` is the immediate successor of `self`. The wrap back to
    /// `Idle` is not an advance; it only happens through a reset.
    pub fn can_advance_to(self, next: SpinPhase) -> bool {
        matches!(
            (self, next),
            (SpinPhase::Idle, SpinPhase::Spinning)
                | (SpinPhase::Spinning, SpinPhase::Revealing)
                | (SpinPhase::Revealing, SpinPhase::Revealed)
        )
    }
}

/// Recurring window over which an exchange limit resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPeriod {
    Daily,
    Monthly,
    Yearly,
}

/// Exchange limit state for the current period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeQuota {
    pub limit_units: u64,
    pub period: QuotaPeriod,
    pub used: u64,
    pub remaining: u64,
    pub reset_at: u64,
}

impl ExchangeQuota {
    /// Holds immediately after any successful fetch or exchange.
    pub fn is_consistent(&self) -> bool {
        self.used + self.remaining == self.limit_units
    }
}

/// One completed coin-to-ticket exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: Uuid,
    pub tickets_exchanged: u64,
    pub coins_spent: u64,
    pub exchanged_at: u64,
}
