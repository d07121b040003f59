pub mod api;
pub mod economy;
pub mod progress;
pub mod session;

pub use api::{ApiErrorBody, ApiErrorDetail, Reason};
pub use economy::{
    ExchangeQuota, ExchangeRecord, GrantedReward, QuotaPeriod, Reward, RewardKind, SpinPhase,
    Wallet,
};
pub use progress::{Achievement, AchievementStatus, DailyRewardDay, DayStatus, DAILY_STREAK_DAYS};
pub use session::{DeviceInfo, SessionPhase, SessionStats};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Wire timestamps use this unit throughout.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
