//! Request and response bodies for the economy backend. Field names follow
//! the backend's snake_case wire contract.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::economy::{ExchangeQuota, ExchangeRecord, GrantedReward, Reward, Wallet};
use crate::progress::{Achievement, AchievementStatus, DailyRewardDay};
use crate::session::{DeviceInfo, SessionStats};

/// Machine-readable rejection reason supplied by the backend. Unknown codes
/// from newer backends degrade to `Unknown` instead of failing to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Unauthorized,
    InsufficientTickets,
    InsufficientCoins,
    NoRewardsAvailable,
    AllUniqueRewardsObtained,
    ProbabilitySelectionFailed,
    CosmeticNotImplemented,
    ExchangeLimitReached,
    SettingsNotConfigured,
    AlreadyClaimedToday,
    AlreadyClaimed,
    NotCompleted,
    #[serde(other)]
    Unknown,
}

/// Error envelope: `{ "error": { "status", "message", "details": { "reason" } } }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub status: u16,
    pub message: String,
    #[serde(default)]
    pub details: ApiErrorDetails,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetails {
    #[serde(default)]
    pub reason: Option<Reason>,
}

impl ApiErrorBody {
    pub fn new(status: u16, message: impl Into<String>, reason: Option<Reason>) -> Self {
        Self {
            error: ApiErrorDetail {
                status,
                message: message.into(),
                details: ApiErrorDetails { reason },
            },
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        self.error.details.reason
    }
}

// --- Spin ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinResponse {
    pub reward: Reward,
    pub user_reward: GrantedReward,
    pub player_stats: Wallet,
}

// --- Exchange ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeAvailability {
    pub can_exchange: bool,
    pub max_tickets_possible: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeStatusResponse {
    pub status: ExchangeAvailability,
    /// Coins per ticket.
    pub rate: u64,
    pub player_stats: Wallet,
    #[serde(default)]
    pub limit: Option<ExchangeQuota>,
    #[serde(default)]
    pub history: Vec<ExchangeRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub tickets_requested: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub tickets_exchanged: u64,
    pub coins_spent: u64,
    pub player_stats: Wallet,
    #[serde(default)]
    pub limit: Option<ExchangeQuota>,
    #[serde(default)]
    pub history: Vec<ExchangeRecord>,
}

// --- Achievements ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementsMeta {
    pub pagination: Pagination,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementsResponse {
    pub achievements: Vec<Achievement>,
    pub player_stats: Wallet,
    pub meta: AchievementsMeta,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub status: Option<AchievementStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAchievementRequest {
    pub uuid: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAchievementResponse {
    pub claimed_achievement: Achievement,
    pub player_stats: Wallet,
}

// --- Daily rewards ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRewardStatus {
    pub can_claim: bool,
    #[serde(default)]
    pub next_claim_at: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRewardsResponse {
    pub rewards: Vec<DailyRewardDay>,
    pub player_stats: Wallet,
    pub status: DailyRewardStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClaimResponse {
    pub rewards: Vec<DailyRewardDay>,
    pub claimed_reward: DailyRewardDay,
    pub player_stats: Wallet,
    pub status: DailyRewardStatus,
}

// --- Session ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartRequest {
    pub session_type: String,
    pub device_info: DeviceInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub session_id: Uuid,
}

/// Heartbeat and end-of-session reports share the stats body.
pub type SessionReport = SessionStats;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reason_degrades() {
        let parsed: Reason = serde_json::from_str("\"reward_pool_migrating\"").unwrap();
        assert_eq!(parsed, Reason::Unknown);

        let parsed: Reason = serde_json::from_str("\"insufficient_tickets\"").unwrap();
        assert_eq!(parsed, Reason::InsufficientTickets);
    }

    #[test]
    fn error_envelope_round_trip() {
        let body = ApiErrorBody::new(400, "not enough tickets", Some(Reason::InsufficientTickets));
        let json = serde_json::to_string(&body).unwrap();
        let back: ApiErrorBody = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reason(), Some(Reason::InsufficientTickets));
        assert_eq!(back.error.status, 400);
    }

    #[test]
    fn error_envelope_tolerates_missing_details() {
        let raw = r#"{ "error": { "status": 500, "message": "boom" } }"#;
        let body: ApiErrorBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.reason(), None);
    }
}
