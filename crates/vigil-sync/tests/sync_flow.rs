use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use vigil_core::{BlockTip, Network};
use vigil_crypto::Hash256;
use vigil_p2p::{NetMessage, PeerManager};
use vigil_sync::{ChainTipObserver, OperatorSync, SyncAsset, SyncConfig, SyncEnvironment};
use vigil_telemetry::{Notification, RecordingSink};

#[derive(Default)]
struct TestEnv {
    enabled: AtomicUsize,
    estimated: AtomicUsize,
    payments_ready: AtomicBool,
    governance_hooks: AtomicUsize,
    resets: AtomicUsize,
}

impl TestEnv {
    fn with_roster(enabled: usize, estimated: usize) -> Self {
        let env = TestEnv::default();
        env.enabled.store(enabled, Ordering::Relaxed);
        env.estimated.store(estimated, Ordering::Relaxed);
        env
    }
}

impl SyncEnvironment for TestEnv {
    fn enabled_operator_count(&self) -> usize {
        self.enabled.load(Ordering::Relaxed)
    }

    fn estimated_operator_count(&self, _height: u64) -> usize {
        self.estimated.load(Ordering::Relaxed)
    }

    fn has_enough_payment_data(&self, _enabled: usize) -> bool {
        self.payments_ready.load(Ordering::Relaxed)
    }

    fn on_governance_synced(&self) {
        self.governance_hooks.fetch_add(1, Ordering::Relaxed);
    }

    fn on_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }
}

struct Harness {
    sync: OperatorSync,
    sink: Arc<RecordingSink>,
    chain: ChainTipObserver,
    peers: PeerManager,
}

impl Harness {
    fn new(network: Network, tip_time: i64) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let sync = OperatorSync::new(SyncConfig::default(), network, sink.clone(), 0);
        let chain = ChainTipObserver::new();
        chain.updated_block_tip(BlockTip::new(5_000, Hash256::zero(), tip_time));
        Harness {
            sync,
            sink,
            chain,
            peers: PeerManager::new(),
        }
    }

    fn tick(&mut self, now: i64, env: &TestEnv) {
        self.sync
            .tick(now, &self.peers, &self.chain, env)
            .expect("tick follows the transition table");
    }
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<NetMessage>) -> Vec<NetMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[test_log::test]
fn sync_reaches_operator_list_then_completes_it() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(5, 100);

    h.tick(0, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::Sporks);

    let (_id, mut rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);
    h.tick(6, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    assert_eq!(drain(&mut rx), vec![NetMessage::GetSporks]);

    h.tick(7, &env);
    assert_eq!(drain(&mut rx), vec![NetMessage::OperatorListRequest]);
    assert_eq!(h.sync.attempts(), 1);

    env.enabled.store(91, Ordering::Relaxed);
    h.tick(8, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::PaymentWinners);
    assert!(h.sync.is_operator_list_synced());
    assert!(drain(&mut rx).is_empty());
}

#[test_log::test]
fn stale_tip_holds_sync_at_sporks() {
    let now = 100_000;
    let mut h = Harness::new(Network::Mainnet, now - 61 * 60);
    let env = TestEnv::with_roster(50, 50);
    let (_id, mut rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

    for t in 0..20 {
        h.tick(now + t * 6, &env);
        assert_eq!(h.sync.current_asset(), SyncAsset::Sporks);
    }
    assert!(!h.sync.is_blockchain_synced(now + 120, &h.chain));
    assert_eq!(drain(&mut rx), vec![NetMessage::GetSporks]);

    h.chain
        .updated_block_tip(BlockTip::new(5_001, Hash256::zero(), now + 125));
    h.tick(now + 126, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
}

#[test_log::test]
fn silent_asset_times_out() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(0, 100);
    let (_id, _rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

    h.tick(0, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    h.tick(1, &env);
    h.tick(5, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    h.tick(6, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::PaymentWinners);
}

#[test_log::test]
fn inventory_reports_keep_asset_alive() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(0, 100);
    let (_id, _rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

    h.tick(0, &env);
    h.tick(1, &env);
    for t in [4, 8, 12] {
        assert!(h
            .sync
            .on_inventory_count(vigil_sync::SyncItemKind::OperatorList, 100, t));
        h.tick(t + 1, &env);
        assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    }
    h.tick(19, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::PaymentWinners);
}

#[test_log::test]
fn progress_is_monotonic_through_a_full_pass() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(1, 100);
    let (_a, _ra) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);
    let (_b, _rb) = h.peers.add_peer("10.0.0.2:9999".into(), 70206);

    let mut now = 0;
    while !h.sync.is_synced() && now < 200 {
        h.tick(now, &env);
        now += 1;
    }
    assert!(h.sync.is_synced());
    assert_eq!(env.governance_hooks.load(Ordering::Relaxed), 1);

    let progress = h.sink.progress_values();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    assert_eq!(progress.last(), Some(&1.0));

    let assets: Vec<String> = h
        .sink
        .snapshot()
        .into_iter()
        .filter_map(|n| match n {
            Notification::SyncAssetChanged(name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(
        assets,
        vec!["SYNC_SPORKS", "SYNC_LIST", "SYNC_WINNERS", "SYNC_GOVERNANCE", "SYNC_FINISHED"]
    );

    h.tick(now + 10, &env);
    assert!(h.sync.is_synced());
}

#[test_log::test]
fn payment_data_short_circuits_winners() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(100, 100);
    env.payments_ready.store(true, Ordering::Relaxed);
    let (_id, _rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

    h.tick(0, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    h.tick(1, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::PaymentWinners);
    h.tick(2, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::Governance);
}

#[test_log::test]
fn finished_without_operators_starts_over() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(3, 100);
    let (_id, _rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

    let mut now = 0;
    while !h.sync.is_synced() && now < 200 {
        h.tick(now, &env);
        now += 1;
    }
    assert!(h.sync.is_synced());

    env.enabled.store(0, Ordering::Relaxed);
    h.sink.take();
    assert_eq!(env.resets.load(Ordering::Relaxed), 0);
    h.tick(now, &env);
    assert!(!h.sync.is_synced());
    assert_eq!(env.resets.load(Ordering::Relaxed), 1);
    assert_eq!(
        h.sink.snapshot().first(),
        Some(&Notification::SyncAssetChanged("SYNC_INITIAL".into()))
    );
}

#[test_log::test]
fn suspended_host_resets_sync() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(0, 100);
    let (_id, mut rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

    h.tick(0, &env);
    h.tick(1, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    assert!(h.sync.blockchain_synced());
    drain(&mut rx);

    h.tick(1 + 61 * 60, &env);
    assert!(!h.sync.blockchain_synced());
    assert_eq!(env.resets.load(Ordering::Relaxed), 1);
    assert_eq!(h.sync.current_asset(), SyncAsset::Sporks);
    assert_eq!(drain(&mut rx), vec![NetMessage::GetSporks]);
}

#[test_log::test]
fn outdated_peers_fail_the_sync_until_cooldown() {
    let mut h = Harness::new(Network::Mainnet, 0);
    let env = TestEnv::with_roster(0, 100);
    let (_id, mut rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70000);

    h.tick(0, &env);
    h.tick(1, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    assert_eq!(drain(&mut rx), vec![NetMessage::GetSporks]);

    h.tick(30, &env);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    h.tick(62, &env);
    assert!(h.sync.is_failed());
    assert_eq!(h.sync.failed_at(), Some(62));

    h.tick(100, &env);
    assert!(h.sync.is_failed());
    h.tick(123, &env);
    assert!(!h.sync.is_failed());
    assert_eq!(env.resets.load(Ordering::Relaxed), 1);
    assert_eq!(h.sync.current_asset(), SyncAsset::OperatorList);
    assert_eq!(drain(&mut rx), vec![NetMessage::GetSporks]);
}

#[test_log::test]
fn regtest_quick_mode_finishes_in_a_few_ticks() {
    let mut h = Harness::new(Network::Regtest, -1_000_000);
    let env = TestEnv::with_roster(2, 100);
    let (_id, mut rx) = h.peers.add_peer("127.0.0.1:19999".into(), 70206);

    for t in 0..7 {
        h.tick(t, &env);
    }
    assert!(h.sync.is_synced());
    assert_eq!(env.governance_hooks.load(Ordering::Relaxed), 1);

    let sent = drain(&mut rx);
    let count = |f: fn(&NetMessage) -> bool| sent.iter().filter(|m| f(*m)).count();
    assert_eq!(count(|m| matches!(m, NetMessage::GetSporks)), 3);
    assert_eq!(count(|m| matches!(m, NetMessage::OperatorListRequest)), 1);
    assert_eq!(count(|m| matches!(m, NetMessage::PaymentWinnersRequest { .. })), 2);
    assert_eq!(count(|m| matches!(m, NetMessage::GovernanceSyncRequest { .. })), 2);
}

proptest::proptest! {
    #[test]
    fn progress_never_regresses_with_irregular_ticks(
        gaps in proptest::collection::vec(1i64..=10, 100),
    ) {
        let mut h = Harness::new(Network::Mainnet, 0);
        let env = TestEnv::with_roster(1, 100);
        let (_id, _rx) = h.peers.add_peer("10.0.0.1:9999".into(), 70206);

        let mut now = 0;
        for gap in gaps {
            if h.sync.is_synced() {
                break;
            }
            h.tick(now, &env);
            now += gap;
        }
        proptest::prop_assert!(h.sync.is_synced());
        let progress = h.sink.progress_values();
        proptest::prop_assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    }
}
