use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::economy::RewardKind;

/// Length of the daily login streak.
pub const DAILY_STREAK_DAYS: u8 = 7;

/// Progress-gated, one-time reward claim state. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementStatus {
    Locked,
    Completed,
    Claimed,
}

impl AchievementStatus {
    fn rank(self) -> u8 {
        match self {
            AchievementStatus::Locked => 0,
            AchievementStatus::Completed => 1,
            AchievementStatus::Claimed => 2,
        }
    }

    /// Forward-only: `locked -> completed -> claimed`, skips allowed, no
    /// reversals.
    pub fn can_transition_to(self, next: AchievementStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub name: String,
    pub status: AchievementStatus,
    pub current_progress: u64,
    pub goal_amount: u64,
    pub reward_kind: RewardKind,
    pub reward_amount: u64,
    pub claimed_at: Option<u64>,
}

impl Achievement {
    /// `claimed_at` is set if and only if the achievement is claimed.
    pub fn is_consistent(&self) -> bool {
        self.claimed_at.is_some() == (self.status == AchievementStatus::Claimed)
    }
}

/// Per-day state in the 7-day login streak.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Locked,
    Available,
    Claimed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRewardDay {
    pub day: u8,
    pub status: DayStatus,
    pub reward_kind: RewardKind,
    pub reward_amount: u64,
    pub claimed_at: Option<u64>,
}

/// Number of leading days already claimed. The claimed set must be a prefix of
/// the schedule for the streak to be well-formed.
pub fn claimed_prefix_len(days: &[DailyRewardDay]) -> usize {
    days.iter()
        .take_while(|d| d.status == DayStatus::Claimed)
        .count()
}

/// The single day currently open for claiming, if any.
pub fn available_day(days: &[DailyRewardDay]) -> Option<u8> {
    days.iter()
        .find(|d| d.status == DayStatus::Available)
        .map(|d| d.day)
}

/// Checks the streak invariants: claimed days form a prefix, at most one day
/// is available, and it immediately follows the claimed prefix.
pub fn schedule_is_consistent(days: &[DailyRewardDay]) -> bool {
    let prefix = claimed_prefix_len(days);
    if days[prefix..].iter().any(|d| d.status == DayStatus::Claimed) {
        return false;
    }
    let available: Vec<_> = days
        .iter()
        .enumerate()
        .filter(|(_, d)| d.status == DayStatus::Available)
        .collect();
    match available.as_slice() {
        [] => true,
        [(idx, _)] => *idx == prefix,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(day: u8, status: DayStatus) -> DailyRewardDay {
        DailyRewardDay {
            day,
            status,
            reward_kind: RewardKind::Coins,
            reward_amount: 50,
            claimed_at: None,
        }
    }

    #[test]
    fn achievement_status_moves_forward_only() {
        use AchievementStatus::*;
        assert!(Locked.can_transition_to(Completed));
        assert!(Locked.can_transition_to(Claimed));
        assert!(Completed.can_transition_to(Claimed));

        assert!(!Claimed.can_transition_to(Completed));
        assert!(!Claimed.can_transition_to(Locked));
        assert!(!Completed.can_transition_to(Locked));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn schedule_invariants() {
        let good = vec![
            day(1, DayStatus::Claimed),
            day(2, DayStatus::Claimed),
            day(3, DayStatus::Available),
            day(4, DayStatus::Locked),
        ];
        assert!(schedule_is_consistent(&good));
        assert_eq!(claimed_prefix_len(&good), 2);
        assert_eq!(available_day(&good), Some(3));

        // Claimed day after a hole is not a prefix.
        let hole = vec![
            day(1, DayStatus::Claimed),
            day(2, DayStatus::Locked),
            day(3, DayStatus::Claimed),
        ];
        assert!(!schedule_is_consistent(&hole));

        // Two available days at once.
        let double = vec![
            day(1, DayStatus::Available),
            day(2, DayStatus::Available),
        ];
        assert!(!schedule_is_consistent(&double));

        // Fully claimed streak has no available day.
        let done = vec![day(1, DayStatus::Claimed), day(2, DayStatus::Claimed)];
        assert!(schedule_is_consistent(&done));
        assert_eq!(available_day(&done), None);
    }
}
