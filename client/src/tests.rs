use std::sync::Arc;
use std::time::Duration;

use gridfall_simulator::{Api, Op, Simulator, SimulatorConfig};
use gridfall_types::api::Reason;
use gridfall_types::progress::schedule_is_consistent;
use gridfall_types::{Achievement, AchievementStatus, RewardKind, SessionPhase, SpinPhase, Wallet};
use tokio::time::sleep;
use uuid::Uuid;

use crate::session::{SessionConfig, SessionManager, StatsAccumulator, Visibility};
use crate::{
    AchievementEngine, ConnectionMonitor, DailyRewardEngine, ExchangeEngine, Gateway,
    GatewayConfig, LinkState, SpinEngine, StaticCredentials, WalletStore,
};

struct TestContext {
    simulator: Arc<Simulator>,
    base_url: String,
    server_handle: tokio::task::JoinHandle<()>,
}

impl TestContext {
    async fn new(config: SimulatorConfig) -> Self {
        let simulator = Arc::new(Simulator::new(config));
        let api = Api::new(simulator.clone());
        let router = api.router();

        // Start server on random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        // Give server time to start
        sleep(Duration::from_millis(50)).await;

        Self {
            simulator,
            base_url,
            server_handle,
        }
    }

    fn gateway(&self) -> Gateway {
        Gateway::new(
            GatewayConfig::new(&self.base_url),
            StaticCredentials::new(self.simulator.bearer_token()),
        )
        .unwrap()
    }

    fn gateway_with_token(&self, token: &str) -> Gateway {
        Gateway::new(GatewayConfig::new(&self.base_url), StaticCredentials::new(token)).unwrap()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

fn achievement(name: &str, status: AchievementStatus, reward_amount: u64) -> Achievement {
    Achievement {
        id: Uuid::new_v4(),
        name: name.to_string(),
        status,
        current_progress: if status == AchievementStatus::Locked { 3 } else { 10 },
        goal_amount: 10,
        reward_kind: RewardKind::Coins,
        reward_amount,
        claimed_at: None,
    }
}

// --- Spin engine ---

#[tokio::test]
async fn spin_commits_authoritative_wallet_on_reveal() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::new(1000, 5));
    let monitor = ConnectionMonitor::new();
    let engine = SpinEngine::new(ctx.gateway(), Arc::clone(&wallet), monitor.clone());

    assert!(engine.spin().await);
    // Optimistic spend is visible immediately; the authoritative wallet is
    // still pending.
    assert_eq!(wallet.get().tickets, 4);
    assert_eq!(engine.phase(), SpinPhase::Spinning);
    let state = engine.state();
    assert!(state.reward.is_some());
    assert!(state.granted.is_some());
    assert_eq!(state.pending_wallet, Some(Wallet::new(1000, 4)));

    assert!(engine.set_phase(SpinPhase::Revealing));
    assert!(engine.set_phase(SpinPhase::Revealed));
    assert_eq!(wallet.get(), Wallet::new(1000, 4));
    assert_eq!(wallet.get(), ctx.simulator.wallet());

    engine.clear_current_reward();
    let state = engine.state();
    assert_eq!(state.phase, SpinPhase::Idle);
    assert!(state.reward.is_none());
    assert!(state.pending_wallet.is_none());
}

#[tokio::test]
async fn spin_rollback_restores_exact_ticket_count() {
    let ctx = TestContext::new(SimulatorConfig {
        initial_wallet: Wallet::new(1000, 0),
        ..SimulatorConfig::default()
    })
    .await;
    let wallet = WalletStore::new(Wallet::new(1000, 0));
    let monitor = ConnectionMonitor::new();
    let engine = SpinEngine::new(ctx.gateway(), Arc::clone(&wallet), monitor.clone());

    assert!(!engine.spin().await);
    // The optimistic decrement is fully reversed and never dips below zero.
    assert_eq!(wallet.get(), Wallet::new(1000, 0));
    let state = engine.state();
    assert_eq!(state.phase, SpinPhase::Idle);
    assert_eq!(
        state.error.as_deref(),
        Some("You don't have enough tickets to spin.")
    );
    // Domain rejections stay engine-local.
    assert_eq!(monitor.state(), LinkState::Online);
    assert_eq!(ctx.simulator.requests(Op::Spin), 1);
}

#[tokio::test]
async fn spin_while_busy_is_a_no_op() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::new(1000, 5));
    let engine = SpinEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.spin().await);
    // First spin is parked in `Spinning` until the UI drives the reveal.
    assert!(!engine.spin().await);
    assert_eq!(ctx.simulator.requests(Op::Spin), 1);
    assert_eq!(wallet.get().tickets, 4);
}

#[tokio::test]
async fn spin_phase_cannot_skip_or_reverse() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::new(1000, 5));
    let engine = SpinEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(!engine.set_phase(SpinPhase::Revealing)); // idle
    assert!(engine.spin().await);
    assert!(!engine.set_phase(SpinPhase::Revealed)); // skip
    assert!(engine.set_phase(SpinPhase::Revealing));
    assert!(!engine.set_phase(SpinPhase::Spinning)); // reverse
    assert!(engine.set_phase(SpinPhase::Revealed));
}

#[tokio::test]
async fn spin_scripted_rejection_maps_to_fixed_message() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    ctx.simulator
        .fail_next(Op::Spin, Reason::ProbabilitySelectionFailed);
    let wallet = WalletStore::new(Wallet::new(1000, 5));
    let engine = SpinEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(!engine.spin().await);
    assert_eq!(wallet.get().tickets, 5);
    assert_eq!(
        engine.state().error.as_deref(),
        Some("The reward draw failed. Please try again.")
    );
}

#[tokio::test]
async fn bad_credentials_escalate_to_session_expiry() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::new(1000, 5));
    let monitor = ConnectionMonitor::new();
    let engine = SpinEngine::new(
        ctx.gateway_with_token("stale-token"),
        Arc::clone(&wallet),
        monitor.clone(),
    );

    assert!(!engine.spin().await);
    assert_eq!(wallet.get().tickets, 5);
    assert_eq!(monitor.state(), LinkState::SessionExpired);
}

// --- Exchange engine ---

#[tokio::test]
async fn exchange_local_validation_skips_the_network() {
    let ctx = TestContext::new(SimulatorConfig {
        initial_wallet: Wallet::new(500, 0),
        ..SimulatorConfig::default()
    })
    .await;
    let wallet = WalletStore::new(Wallet::default());
    let engine = ExchangeEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_status().await);
    let state = engine.state();
    assert_eq!(state.rate, 100);
    assert_eq!(state.max_tickets_possible, 5);

    // 10 > 5: rejected locally, before any request is made.
    assert!(!engine.exchange(10).await);
    assert!(!engine.exchange(0).await);
    assert_eq!(ctx.simulator.requests(Op::Exchange), 0);
    assert!(engine.state().error.is_some());
    assert_eq!(wallet.get(), Wallet::new(500, 0));
}

#[tokio::test]
async fn exchange_success_recomputes_capacity() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::default());
    let engine = ExchangeEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_status().await);
    assert!(engine.exchange(3).await);

    assert_eq!(wallet.get(), Wallet::new(700, 8));
    let state = engine.state();
    let quota = state.quota.unwrap();
    assert!(quota.is_consistent());
    assert_eq!(quota.remaining, 47);
    // max = min(floor(700 / 100), 47)
    assert_eq!(state.max_tickets_possible, 7);
    assert!(state.can_exchange);
    assert_eq!(state.history.len(), 1);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn exchange_rejection_leaves_wallet_untouched() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::default());
    let engine = ExchangeEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_status().await);
    let before = wallet.get();
    ctx.simulator.fail_next(Op::Exchange, Reason::InsufficientCoins);

    assert!(!engine.exchange(2).await);
    assert_eq!(wallet.get(), before);
    assert_eq!(
        engine.state().error.as_deref(),
        Some("Not enough coins for that exchange.")
    );
}

#[tokio::test]
async fn exchange_fetch_failure_preserves_prior_state() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::default());
    let engine = ExchangeEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_status().await);
    let before = engine.state();

    ctx.simulator.fail_next(Op::ExchangeStatus, Reason::Unknown);
    assert!(!engine.fetch_status().await);
    let after = engine.state();
    assert_eq!(after.rate, before.rate);
    assert_eq!(after.max_tickets_possible, before.max_tickets_possible);
    assert_eq!(after.history.len(), before.history.len());
    assert!(after.error.is_some());
}

// --- Achievement engine ---

#[tokio::test]
async fn achievement_claim_patches_only_the_target() {
    let ready = achievement("First Clear", AchievementStatus::Completed, 250);
    let locked = achievement("Marathon", AchievementStatus::Locked, 1000);
    let ready_id = ready.id;
    let locked_id = locked.id;
    let ctx = TestContext::new(SimulatorConfig {
        achievements: vec![ready, locked],
        ..SimulatorConfig::default()
    })
    .await;
    let wallet = WalletStore::new(Wallet::default());
    let engine =
        AchievementEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_achievements(None, 1).await);
    assert_eq!(engine.state().available_count, 1);
    let coins_before = wallet.get().coins;

    assert!(engine.claim_achievement(ready_id).await);
    assert_eq!(wallet.get().coins, coins_before + 250);
    let state = engine.state();
    assert_eq!(state.available_count, 0);
    assert_eq!(state.last_claimed.as_ref().unwrap().id, ready_id);

    let claimed = state
        .achievements
        .iter()
        .find(|a| a.id == ready_id)
        .unwrap();
    assert_eq!(claimed.status, AchievementStatus::Claimed);
    assert!(claimed.is_consistent());
    let untouched = state
        .achievements
        .iter()
        .find(|a| a.id == locked_id)
        .unwrap();
    assert_eq!(untouched.status, AchievementStatus::Locked);
    assert!(untouched.claimed_at.is_none());
}

#[tokio::test]
async fn ineligible_claims_fail_fast_without_network() {
    let ready = achievement("First Clear", AchievementStatus::Completed, 250);
    let locked = achievement("Marathon", AchievementStatus::Locked, 1000);
    let ready_id = ready.id;
    let locked_id = locked.id;
    let ctx = TestContext::new(SimulatorConfig {
        achievements: vec![ready, locked],
        ..SimulatorConfig::default()
    })
    .await;
    let wallet = WalletStore::new(Wallet::default());
    let engine =
        AchievementEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());
    assert!(engine.fetch_achievements(None, 1).await);

    // Locked entry: no request.
    assert!(!engine.claim_achievement(locked_id).await);
    // Unknown entry: no request.
    assert!(!engine.claim_achievement(Uuid::new_v4()).await);
    assert_eq!(ctx.simulator.requests(Op::ClaimAchievement), 0);

    // Already-claimed entry: one request for the claim, none for the retry.
    assert!(engine.claim_achievement(ready_id).await);
    assert!(!engine.claim_achievement(ready_id).await);
    assert_eq!(ctx.simulator.requests(Op::ClaimAchievement), 1);
}

#[tokio::test]
async fn achievement_filter_narrows_the_fetch() {
    let ctx = TestContext::new(SimulatorConfig {
        achievements: vec![
            achievement("A", AchievementStatus::Completed, 10),
            achievement("B", AchievementStatus::Locked, 10),
            achievement("C", AchievementStatus::Completed, 10),
        ],
        ..SimulatorConfig::default()
    })
    .await;
    let wallet = WalletStore::new(Wallet::default());
    let engine =
        AchievementEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(
        engine
            .fetch_achievements(Some(AchievementStatus::Completed), 1)
            .await
    );
    let state = engine.state();
    assert_eq!(state.achievements.len(), 2);
    assert_eq!(state.available_count, 2);
    assert_eq!(state.pagination.unwrap().total, 2);
}

// --- Daily-reward engine ---

#[tokio::test]
async fn daily_claim_advances_exactly_one_day() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::default());
    let engine =
        DailyRewardEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_status().await);
    let state = engine.state();
    assert!(state.can_claim);
    assert_eq!(state.rewards.len(), 7);
    let coins_before = wallet.get().coins;

    assert!(engine.claim_reward().await);
    let state = engine.state();
    assert_eq!(state.last_claimed.as_ref().unwrap().day, 1);
    assert!(schedule_is_consistent(&state.rewards));
    assert!(!state.can_claim);
    assert!(state.next_claim_at.is_some());
    assert_eq!(wallet.get().coins, coins_before + 50);

    // Local guard: no second request while ineligible.
    assert!(!engine.claim_reward().await);
    assert_eq!(ctx.simulator.requests(Op::DailyClaim), 1);
}

#[tokio::test]
async fn already_claimed_today_is_informational() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let wallet = WalletStore::new(Wallet::default());
    let engine =
        DailyRewardEngine::new(ctx.gateway(), Arc::clone(&wallet), ConnectionMonitor::new());

    assert!(engine.fetch_status().await);
    ctx.simulator
        .fail_next(Op::DailyClaim, Reason::AlreadyClaimedToday);

    assert!(!engine.claim_reward().await);
    let state = engine.state();
    assert!(state.already_claimed_today);
    assert!(!state.can_claim);
    // Informational, not an error.
    assert!(state.error.is_none());
}

// --- Session lifecycle ---

fn session_manager(ctx: &TestContext, interval: Duration) -> (SessionManager, Arc<StatsAccumulator>) {
    let stats = StatsAccumulator::new();
    let manager = SessionManager::new(
        ctx.gateway(),
        Arc::clone(&stats),
        ConnectionMonitor::new(),
        SessionConfig {
            heartbeat_interval: interval,
            ..SessionConfig::default()
        },
    );
    (manager, stats)
}

#[tokio::test]
async fn heartbeat_pauses_while_hidden_with_one_flush() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let (manager, stats) = session_manager(&ctx, Duration::from_millis(50));

    assert!(manager.start().await);
    assert_eq!(manager.phase(), SessionPhase::Active);
    stats.record_game(100, 25);

    sleep(Duration::from_millis(130)).await;
    let while_visible = ctx.simulator.requests(Op::Heartbeat);
    assert!(while_visible >= 2);

    manager.set_visibility(Visibility::Hidden);
    sleep(Duration::from_millis(80)).await;
    let after_flush = ctx.simulator.requests(Op::Heartbeat);
    // Exactly one flush at the hidden transition.
    assert_eq!(after_flush, while_visible + 1);
    assert_eq!(ctx.simulator.last_report().games_played, 1);

    // Nothing fires during the hidden interval.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(ctx.simulator.requests(Op::Heartbeat), after_flush);

    // The periodic timer resumes only after visibility returns.
    manager.set_visibility(Visibility::Visible);
    sleep(Duration::from_millis(130)).await;
    assert!(ctx.simulator.requests(Op::Heartbeat) > after_flush);

    assert!(manager.end().await);
}

#[tokio::test]
async fn session_end_is_attempted_exactly_once() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let (manager, stats) = session_manager(&ctx, Duration::from_secs(30));

    assert!(manager.start().await);
    stats.record_game(500, 40);

    assert!(manager.end().await);
    assert_eq!(manager.phase(), SessionPhase::Idle);
    assert_eq!(ctx.simulator.requests(Op::SessionEnd), 1);
    assert!(!ctx.simulator.session_active());
    assert_eq!(ctx.simulator.last_report().score, 500);

    // Every further teardown path is a no-op.
    assert!(!manager.end().await);
    assert!(!manager.end_detached());
    assert_eq!(ctx.simulator.requests(Op::SessionEnd), 1);
}

#[tokio::test]
async fn detached_end_survives_without_being_awaited() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let (manager, stats) = session_manager(&ctx, Duration::from_secs(30));

    assert!(manager.start().await);
    stats.record_game(100, 10);

    assert!(manager.end_detached());
    assert_eq!(manager.phase(), SessionPhase::Idle);
    // The keepalive task delivers after the caller has moved on.
    sleep(Duration::from_millis(150)).await;
    assert_eq!(ctx.simulator.requests(Op::SessionEnd), 1);
    assert_eq!(ctx.simulator.last_report().games_played, 1);

    assert!(!manager.end().await);
    assert_eq!(ctx.simulator.requests(Op::SessionEnd), 1);
}

#[tokio::test]
async fn dropping_the_manager_stops_the_heartbeat() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    let (manager, _stats) = session_manager(&ctx, Duration::from_millis(40));

    assert!(manager.start().await);
    sleep(Duration::from_millis(100)).await;
    drop(manager);

    let at_drop = ctx.simulator.requests(Op::Heartbeat);
    sleep(Duration::from_millis(150)).await;
    // No tick after teardown; the best-effort end still goes out.
    assert_eq!(ctx.simulator.requests(Op::Heartbeat), at_drop);
    assert_eq!(ctx.simulator.requests(Op::SessionEnd), 1);
}

#[tokio::test]
async fn failed_start_returns_to_idle() {
    let ctx = TestContext::new(SimulatorConfig::default()).await;
    ctx.simulator.fail_next(Op::SessionStart, Reason::Unknown);
    let (manager, _stats) = session_manager(&ctx, Duration::from_millis(40));

    assert!(!manager.start().await);
    assert_eq!(manager.phase(), SessionPhase::Idle);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.simulator.requests(Op::Heartbeat), 0);

    // A fresh start is allowed after the failure.
    assert!(manager.start().await);
    assert!(manager.end().await);
}
