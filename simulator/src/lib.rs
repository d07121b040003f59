//! In-memory implementation of the gridfall economy backend.
//!
//! Holds the authoritative wallet, reward pool, exchange quota, achievement
//! list, daily streak, and session log for a single player. Tests script
//! failures with [`Simulator::fail_next`] and assert on per-operation request
//! counters.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use gridfall_types::api::{
    AchievementsMeta, AchievementsQuery, AchievementsResponse, ApiErrorBody,
    ClaimAchievementResponse, DailyClaimResponse, DailyRewardStatus, DailyRewardsResponse,
    ExchangeAvailability, ExchangeRequest, ExchangeResponse, ExchangeStatusResponse, Pagination,
    Reason, SessionStartRequest, SessionStartResponse, SpinResponse,
};
use gridfall_types::{
    now_ms, Achievement, AchievementStatus, DailyRewardDay, DayStatus, ExchangeQuota,
    ExchangeRecord, GrantedReward, QuotaPeriod, Reward, RewardKind, SessionStats, Wallet,
    DAILY_STREAK_DAYS,
};
use tracing::{debug, info};
use uuid::Uuid;

mod api;
pub use api::Api;

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Backend operations, used to key failure injection and request counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Spin,
    ExchangeStatus,
    Exchange,
    Achievements,
    ClaimAchievement,
    DailyStatus,
    DailyClaim,
    SessionStart,
    Heartbeat,
    SessionEnd,
}

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub bearer_token: String,
    pub initial_wallet: Wallet,
    /// Coins per ticket. Zero means exchange settings are not configured.
    pub rate: u64,
    pub quota_limit: u64,
    pub quota_period: QuotaPeriod,
    pub rewards: Vec<Reward>,
    pub achievements: Vec<Achievement>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bearer_token: "dev-token".to_string(),
            initial_wallet: Wallet::new(1000, 5),
            rate: 100,
            quota_limit: 50,
            quota_period: QuotaPeriod::Daily,
            rewards: vec![Reward {
                id: Uuid::new_v4(),
                name: "Neon Block Skin".to_string(),
                kind: RewardKind::Cosmetic,
                amount: 0,
            }],
            achievements: Vec::new(),
        }
    }
}

struct Backend {
    wallet: Wallet,
    rewards: VecDeque<Reward>,
    rate: u64,
    quota: ExchangeQuota,
    history: Vec<ExchangeRecord>,
    achievements: Vec<Achievement>,
    daily: Vec<DailyRewardDay>,
    claimed_today: bool,
    next_claim_at: Option<u64>,
    session_active: bool,
    last_report: SessionStats,
    failures: HashMap<Op, VecDeque<Reason>>,
    requests: HashMap<Op, u64>,
}

pub struct Simulator {
    bearer_token: String,
    state: Mutex<Backend>,
}

/// Fresh 7-day schedule: day one open, the rest locked.
fn fresh_schedule() -> Vec<DailyRewardDay> {
    (1..=DAILY_STREAK_DAYS)
        .map(|day| DailyRewardDay {
            day,
            status: if day == 1 {
                DayStatus::Available
            } else {
                DayStatus::Locked
            },
            reward_kind: RewardKind::Coins,
            reward_amount: 50 * day as u64,
            claimed_at: None,
        })
        .collect()
}

fn rejection(reason: Reason, message: &str) -> ApiErrorBody {
    let status = match reason {
        Reason::Unauthorized => 401,
        Reason::Unknown => 500,
        _ => 400,
    };
    ApiErrorBody::new(status, message, Some(reason))
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let quota = ExchangeQuota {
            limit_units: config.quota_limit,
            period: config.quota_period,
            used: 0,
            remaining: config.quota_limit,
            reset_at: now_ms() + DAY_MS,
        };
        info!(
            coins = config.initial_wallet.coins,
            tickets = config.initial_wallet.tickets,
            rate = config.rate,
            quota = config.quota_limit,
            "simulator initialized"
        );
        Self {
            bearer_token: config.bearer_token,
            state: Mutex::new(Backend {
                wallet: config.initial_wallet,
                rewards: config.rewards.into(),
                rate: config.rate,
                quota,
                history: Vec::new(),
                achievements: config.achievements,
                daily: fresh_schedule(),
                claimed_today: false,
                next_claim_at: None,
                session_active: false,
                last_report: SessionStats::default(),
                failures: HashMap::new(),
                requests: HashMap::new(),
            }),
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    /// Scripts the next call to `op` to be rejected with `reason`.
    pub fn fail_next(&self, op: Op, reason: Reason) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(op).or_default().push_back(reason);
    }

    /// How many requests have reached `op` (counted before auth).
    pub fn requests(&self, op: Op) -> u64 {
        let state = self.state.lock().unwrap();
        state.requests.get(&op).copied().unwrap_or(0)
    }

    /// Current authoritative wallet.
    pub fn wallet(&self) -> Wallet {
        self.state.lock().unwrap().wallet
    }

    pub fn session_active(&self) -> bool {
        self.state.lock().unwrap().session_active
    }

    /// Last stats body received on a heartbeat or end report.
    pub fn last_report(&self) -> SessionStats {
        self.state.lock().unwrap().last_report
    }

    fn record(&self, op: Op) {
        let mut state = self.state.lock().unwrap();
        *state.requests.entry(op).or_insert(0) += 1;
    }

    fn take_failure(&self, op: Op) -> Option<Reason> {
        let mut state = self.state.lock().unwrap();
        state.failures.get_mut(&op).and_then(|queue| queue.pop_front())
    }

    fn guard(&self, op: Op) -> Result<(), ApiErrorBody> {
        self.record(op);
        match self.take_failure(op) {
            Some(reason) => Err(rejection(reason, "scripted rejection")),
            None => Ok(()),
        }
    }

    // --- Spin ---

    pub fn spin(&self) -> Result<SpinResponse, ApiErrorBody> {
        self.guard(Op::Spin)?;
        let mut state = self.state.lock().unwrap();
        if state.wallet.tickets == 0 {
            return Err(rejection(Reason::InsufficientTickets, "no tickets left"));
        }
        let Some(reward) = state.rewards.pop_front() else {
            return Err(rejection(Reason::NoRewardsAvailable, "reward pool empty"));
        };
        state.rewards.push_back(reward.clone());

        state.wallet.tickets -= 1;
        match reward.kind {
            RewardKind::Coins => state.wallet.coins += reward.amount,
            RewardKind::Tickets => state.wallet.tickets += reward.amount,
            RewardKind::Cosmetic => {}
        }
        let granted = GrantedReward {
            id: Uuid::new_v4(),
            reward_id: reward.id,
            granted_at: now_ms(),
        };
        debug!(reward = %reward.name, tickets = state.wallet.tickets, "spin resolved");
        Ok(SpinResponse {
            reward,
            user_reward: granted,
            player_stats: state.wallet,
        })
    }

    // --- Exchange ---

    fn availability(rate: u64, wallet: Wallet, quota: &ExchangeQuota) -> ExchangeAvailability {
        let max_tickets_possible = if rate == 0 {
            0
        } else {
            (wallet.coins / rate).min(quota.remaining)
        };
        ExchangeAvailability {
            can_exchange: max_tickets_possible > 0,
            max_tickets_possible,
        }
    }

    pub fn exchange_status(&self) -> Result<ExchangeStatusResponse, ApiErrorBody> {
        self.guard(Op::ExchangeStatus)?;
        let state = self.state.lock().unwrap();
        Ok(ExchangeStatusResponse {
            status: Self::availability(state.rate, state.wallet, &state.quota),
            rate: state.rate,
            player_stats: state.wallet,
            limit: Some(state.quota),
            history: state.history.clone(),
        })
    }

    pub fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse, ApiErrorBody> {
        self.guard(Op::Exchange)?;
        let mut state = self.state.lock().unwrap();
        let tickets = request.tickets_requested;
        if state.rate == 0 {
            return Err(rejection(
                Reason::SettingsNotConfigured,
                "exchange rate not configured",
            ));
        }
        if tickets == 0 || tickets > state.quota.remaining {
            return Err(rejection(Reason::ExchangeLimitReached, "over quota"));
        }
        let Some(coins_spent) = tickets.checked_mul(state.rate) else {
            return Err(rejection(Reason::ExchangeLimitReached, "over quota"));
        };
        if coins_spent > state.wallet.coins {
            return Err(rejection(Reason::InsufficientCoins, "not enough coins"));
        }

        state.wallet.coins -= coins_spent;
        state.wallet.tickets += tickets;
        state.quota.used += tickets;
        state.quota.remaining -= tickets;
        let record = ExchangeRecord {
            id: Uuid::new_v4(),
            tickets_exchanged: tickets,
            coins_spent,
            exchanged_at: now_ms(),
        };
        state.history.push(record);
        debug!(tickets, coins_spent, "exchange resolved");
        Ok(ExchangeResponse {
            tickets_exchanged: tickets,
            coins_spent,
            player_stats: state.wallet,
            limit: Some(state.quota),
            history: state.history.clone(),
        })
    }

    // --- Achievements ---

    pub fn achievements(
        &self,
        query: AchievementsQuery,
    ) -> Result<AchievementsResponse, ApiErrorBody> {
        self.guard(Op::Achievements)?;
        let state = self.state.lock().unwrap();
        let filtered: Vec<Achievement> = state
            .achievements
            .iter()
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(25).max(1);
        let total = filtered.len() as u64;
        let page_count = total.div_ceil(page_size as u64) as u32;
        // Saturate so an absurd page number yields an empty page, not a panic.
        let start = (page as usize - 1).saturating_mul(page_size as usize);
        let achievements = filtered
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();
        Ok(AchievementsResponse {
            achievements,
            player_stats: state.wallet,
            meta: AchievementsMeta {
                pagination: Pagination {
                    page,
                    page_size,
                    page_count,
                    total,
                },
            },
        })
    }

    pub fn claim_achievement(&self, id: Uuid) -> Result<ClaimAchievementResponse, ApiErrorBody> {
        self.guard(Op::ClaimAchievement)?;
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.achievements.iter().position(|a| a.id == id) else {
            return Err(rejection(Reason::NotCompleted, "achievement not found"));
        };
        match state.achievements[idx].status {
            AchievementStatus::Claimed => {
                return Err(rejection(Reason::AlreadyClaimed, "already claimed"));
            }
            AchievementStatus::Locked => {
                return Err(rejection(Reason::NotCompleted, "achievement not completed"));
            }
            AchievementStatus::Completed => {}
        }

        let (kind, amount) = {
            let entry = &mut state.achievements[idx];
            entry.status = AchievementStatus::Claimed;
            entry.claimed_at = Some(now_ms());
            (entry.reward_kind, entry.reward_amount)
        };
        match kind {
            RewardKind::Coins => state.wallet.coins += amount,
            RewardKind::Tickets => state.wallet.tickets += amount,
            RewardKind::Cosmetic => {}
        }
        Ok(ClaimAchievementResponse {
            claimed_achievement: state.achievements[idx].clone(),
            player_stats: state.wallet,
        })
    }

    // --- Daily rewards ---

    fn daily_status_locked(state: &Backend) -> DailyRewardStatus {
        DailyRewardStatus {
            can_claim: !state.claimed_today
                && state.daily.iter().any(|d| d.status == DayStatus::Available),
            next_claim_at: state.next_claim_at,
        }
    }

    pub fn daily_status(&self) -> Result<DailyRewardsResponse, ApiErrorBody> {
        self.guard(Op::DailyStatus)?;
        let state = self.state.lock().unwrap();
        Ok(DailyRewardsResponse {
            rewards: state.daily.clone(),
            player_stats: state.wallet,
            status: Self::daily_status_locked(&state),
        })
    }

    pub fn daily_claim(&self) -> Result<DailyClaimResponse, ApiErrorBody> {
        self.guard(Op::DailyClaim)?;
        let mut state = self.state.lock().unwrap();
        if state.claimed_today {
            return Err(rejection(Reason::AlreadyClaimedToday, "come back tomorrow"));
        }
        let Some(idx) = state
            .daily
            .iter()
            .position(|d| d.status == DayStatus::Available)
        else {
            return Err(rejection(Reason::AlreadyClaimed, "streak complete"));
        };

        let (kind, amount) = {
            let entry = &mut state.daily[idx];
            entry.status = DayStatus::Claimed;
            entry.claimed_at = Some(now_ms());
            (entry.reward_kind, entry.reward_amount)
        };
        match kind {
            RewardKind::Coins => state.wallet.coins += amount,
            RewardKind::Tickets => state.wallet.tickets += amount,
            RewardKind::Cosmetic => {}
        }
        if let Some(next) = state.daily.get_mut(idx + 1) {
            next.status = DayStatus::Available;
        }
        state.claimed_today = true;
        state.next_claim_at = Some(now_ms() + DAY_MS);

        Ok(DailyClaimResponse {
            claimed_reward: state.daily[idx].clone(),
            rewards: state.daily.clone(),
            player_stats: state.wallet,
            status: Self::daily_status_locked(&state),
        })
    }

    /// Rolls the clock past the cooldown, re-opening today's claim.
    pub fn advance_day(&self) {
        let mut state = self.state.lock().unwrap();
        state.claimed_today = false;
        state.next_claim_at = None;
    }

    // --- Sessions ---

    pub fn session_start(
        &self,
        request: SessionStartRequest,
    ) -> Result<SessionStartResponse, ApiErrorBody> {
        self.guard(Op::SessionStart)?;
        let mut state = self.state.lock().unwrap();
        state.session_active = true;
        state.last_report = SessionStats::default();
        info!(
            session_type = %request.session_type,
            platform = %request.device_info.platform,
            "session started"
        );
        Ok(SessionStartResponse {
            session_id: Uuid::new_v4(),
        })
    }

    pub fn heartbeat(&self, stats: SessionStats) -> Result<(), ApiErrorBody> {
        self.guard(Op::Heartbeat)?;
        let mut state = self.state.lock().unwrap();
        state.last_report = stats;
        Ok(())
    }

    pub fn session_end(&self, stats: SessionStats) -> Result<(), ApiErrorBody> {
        self.guard(Op::SessionEnd)?;
        let mut state = self.state.lock().unwrap();
        state.session_active = false;
        state.last_report = stats;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridfall_types::progress::schedule_is_consistent;

    #[test]
    fn spin_spends_one_ticket_and_rotates_rewards() {
        let simulator = Simulator::new(SimulatorConfig::default());
        let response = simulator.spin().unwrap();
        assert_eq!(response.player_stats.tickets, 4);
        assert_eq!(response.player_stats.coins, 1000);
        assert_eq!(simulator.requests(Op::Spin), 1);
    }

    #[test]
    fn spin_rejects_without_tickets() {
        let simulator = Simulator::new(SimulatorConfig {
            initial_wallet: Wallet::new(1000, 0),
            ..SimulatorConfig::default()
        });
        let err = simulator.spin().unwrap_err();
        assert_eq!(err.reason(), Some(Reason::InsufficientTickets));
        assert_eq!(simulator.wallet().tickets, 0);
    }

    #[test]
    fn exchange_moves_quota_and_wallet_together() {
        let simulator = Simulator::new(SimulatorConfig::default());
        let response = simulator
            .exchange(ExchangeRequest {
                tickets_requested: 3,
            })
            .unwrap();
        assert_eq!(response.player_stats.coins, 700);
        assert_eq!(response.player_stats.tickets, 8);
        let quota = response.limit.unwrap();
        assert!(quota.is_consistent());
        assert_eq!(quota.used, 3);
        assert_eq!(response.history.len(), 1);
    }

    #[test]
    fn exchange_rejects_overflowing_totals() {
        let simulator = Simulator::new(SimulatorConfig {
            rate: u64::MAX,
            quota_limit: u64::MAX,
            ..SimulatorConfig::default()
        });
        let err = simulator
            .exchange(ExchangeRequest {
                tickets_requested: 2,
            })
            .unwrap_err();
        assert_eq!(err.reason(), Some(Reason::ExchangeLimitReached));
        assert_eq!(simulator.wallet(), Wallet::new(1000, 5));
    }

    #[test]
    fn achievement_page_past_the_end_is_empty() {
        let simulator = Simulator::new(SimulatorConfig {
            achievements: vec![Achievement {
                id: Uuid::new_v4(),
                name: "First Clear".to_string(),
                status: AchievementStatus::Completed,
                current_progress: 10,
                goal_amount: 10,
                reward_kind: RewardKind::Coins,
                reward_amount: 100,
                claimed_at: None,
            }],
            ..SimulatorConfig::default()
        });
        let response = simulator
            .achievements(AchievementsQuery {
                page: Some(u32::MAX),
                page_size: Some(u32::MAX),
                status: None,
            })
            .unwrap();
        assert!(response.achievements.is_empty());
        assert_eq!(response.meta.pagination.total, 1);
    }

    #[test]
    fn daily_streak_stays_consistent_across_claims() {
        let simulator = Simulator::new(SimulatorConfig::default());
        for expected_day in 1..=3u8 {
            let response = simulator.daily_claim().unwrap();
            assert_eq!(response.claimed_reward.day, expected_day);
            assert!(schedule_is_consistent(&response.rewards));
            assert!(!response.status.can_claim);

            let err = simulator.daily_claim().unwrap_err();
            assert_eq!(err.reason(), Some(Reason::AlreadyClaimedToday));
            simulator.advance_day();
        }
    }

    #[test]
    fn scripted_failure_consumed_once() {
        let simulator = Simulator::new(SimulatorConfig::default());
        simulator.fail_next(Op::Spin, Reason::ProbabilitySelectionFailed);
        let err = simulator.spin().unwrap_err();
        assert_eq!(err.reason(), Some(Reason::ProbabilitySelectionFailed));
        // Scripted rejection happens before any state change.
        assert_eq!(simulator.wallet().tickets, 5);
        assert!(simulator.spin().is_ok());
    }
}
