//! Migration runner and fan migration tests.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tuya_bridge_devices::classes::fan::{
    FanSpeedPercentRangeMigration, ReversedFanDirectionMigration, TuyaCapabilitiesMigration,
};
use tuya_bridge_devices::{
    ClassStrategy, DataPoint, DeviceState, FanStrategy, Migration, MigrationContext, MigrationOutcome,
    MigrationRunner, RangeMeta,
};
use tuya_bridge_storage::{DeviceStore, MemoryBackend, StorageBackend};
use tuya_bridge_testing::fixtures::{fan_specification, malformed_specification};
use tuya_bridge_testing::{MockHostDevice, MockVendorClient};

const DEVICE: &str = "bf5a21c0ffee";

fn store(backend: &Arc<dyn StorageBackend>) -> DeviceStore {
    DeviceStore::new(backend.clone(), DEVICE)
}

fn fan_state(backend: &Arc<dyn StorageBackend>, codes: &[&str]) -> DeviceState {
    let store = store(backend);
    store
        .set_value("tuya_capabilities", &json!(codes))
        .unwrap();
    store.set_value("tuya_category", &json!("fs")).unwrap();
    DeviceState::load(store).unwrap()
}

struct Counting {
    name: &'static str,
    runs: AtomicUsize,
    fail: bool,
}

impl Counting {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            runs: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl Migration for Counting {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn migrate(&self, _ctx: &mut MigrationContext<'_>) -> anyhow::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("vendor unreachable");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_migration_runs_once_across_starts() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new();
    let migration = Counting::new("once");

    let mut state = fan_state(&backend, &["switch"]);
    let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
    assert!(matches!(
        MigrationRunner::run(&mut ctx, &migration).await,
        MigrationOutcome::Completed
    ));

    // a fresh load sees the persisted marker
    let mut state = DeviceState::load(store(&backend)).unwrap();
    assert!(state.is_migration_completed("once"));
    let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
    assert!(matches!(
        MigrationRunner::run(&mut ctx, &migration).await,
        MigrationOutcome::Skipped
    ));

    assert_eq!(migration.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_migration_is_retried_and_siblings_run() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new();
    let migrations: Vec<Box<dyn Migration>> = vec![
        Box::new(Counting::failing("flaky")),
        Box::new(Counting::new("after")),
    ];

    let mut state = fan_state(&backend, &[]);
    let report = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run_all(&mut ctx, &migrations).await
    };

    assert!(report.has_failures());
    assert_eq!(report.failed().collect::<Vec<_>>(), vec!["flaky"]);
    assert_eq!(report.completed().collect::<Vec<_>>(), vec!["after"]);
    assert!(!state.is_migration_completed("flaky"));
    assert!(state.is_migration_completed("after"));

    let report = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run_all(&mut ctx, &migrations).await
    };
    assert!(report.outcome("flaky").unwrap().is_failed());
    assert!(matches!(report.outcome("after"), Some(MigrationOutcome::Skipped)));
}

#[tokio::test]
async fn test_tuya_capabilities_merges_live_status() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new().with_status(
        DEVICE,
        vec![
            DataPoint::new("switch", true),
            DataPoint::new("fan_speed_percent", 3),
            DataPoint::new("countdown_left", 0),
        ],
    );

    let mut state = fan_state(&backend, &["fan_direction"]);
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &TuyaCapabilitiesMigration).await
    };

    assert!(matches!(outcome, MigrationOutcome::Completed));
    assert_eq!(
        state.vendor_capabilities(),
        ["fan_direction", "switch", "fan_speed_percent"]
    );
    assert_eq!(
        store(&backend).get_string_list("tuya_capabilities").unwrap(),
        vec!["fan_direction", "switch", "fan_speed_percent"]
    );
}

#[tokio::test]
async fn test_tuya_capabilities_fails_when_status_unavailable() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new();
    vendor.set_status_offline(true);

    let mut state = fan_state(&backend, &[]);
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &TuyaCapabilitiesMigration).await
    };

    assert!(outcome.is_failed());
    assert!(!state.is_migration_completed("fan_tuya_capabilities"));
}

#[tokio::test]
async fn test_reversed_direction_from_specification() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new()
        .with_specification(DEVICE, fan_specification(1, 6, 1, &["forward", "reverse"]));

    let mut state = fan_state(&backend, &["fan_direction"]);
    {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &ReversedFanDirectionMigration).await;
    }

    assert_eq!(state.reversed_fan_direction().as_deref(), Some("reverse"));
}

#[tokio::test]
async fn test_reversed_direction_defaults_without_specification() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new();
    vendor.set_specification_offline(true);

    let mut state = fan_state(&backend, &["fan_direction"]);
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &ReversedFanDirectionMigration).await
    };

    assert!(matches!(outcome, MigrationOutcome::Completed));
    assert_eq!(state.reversed_fan_direction().as_deref(), Some("backward"));
}

#[tokio::test]
async fn test_fan_speed_range_stored_and_step_aligned() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new().with_capabilities(["onoff", "fan_speed"]);
    let vendor = MockVendorClient::new()
        .with_specification(DEVICE, fan_specification(1, 6, 1, &["forward", "reverse"]));

    let mut state = fan_state(&backend, &["switch", "fan_speed_percent"]);
    {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &FanSpeedPercentRangeMigration).await;
    }

    assert_eq!(
        state.range_meta("fan_speed_percent", RangeMeta::default()),
        RangeMeta::new(1.0, 6.0, 1.0)
    );
    let options = host.options("fan_speed").unwrap();
    assert_eq!((options.min, options.max), (0.0, 1.0));
    assert!((options.step - 0.2).abs() < 1e-12);
}

#[tokio::test]
async fn test_fan_speed_range_skipped_without_capability() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new().with_capabilities(["onoff"]);
    let vendor = MockVendorClient::new()
        .with_specification(DEVICE, fan_specification(1, 6, 1, &["forward", "reverse"]));

    let mut state = fan_state(&backend, &["switch", "fan_speed_percent"]);
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &FanSpeedPercentRangeMigration).await
    };

    assert!(matches!(outcome, MigrationOutcome::Completed));
    assert_eq!(vendor.specification_calls(), 0);
    assert!(store(&backend).get_value("fan_speed_percent_max").unwrap().is_none());
}

#[tokio::test]
async fn test_fan_speed_range_retries_after_malformed_specification() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new().with_capabilities(["fan_speed"]);
    let vendor = MockVendorClient::new().with_specification(DEVICE, malformed_specification());

    let mut state = fan_state(&backend, &["fan_speed_percent"]);
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &FanSpeedPercentRangeMigration).await
    };

    assert!(outcome.is_failed());
    assert!(!state.is_migration_completed("fan_speed_percent_range"));
    assert!(host.options("fan_speed").is_none());
    assert_eq!(
        state.range_meta("fan_speed_percent", RangeMeta::default()),
        RangeMeta::default()
    );

    // next startup sees a valid document
    let vendor = MockVendorClient::new()
        .with_specification(DEVICE, fan_specification(1, 6, 1, &["forward", "reverse"]));
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &FanSpeedPercentRangeMigration).await
    };

    assert!(matches!(outcome, MigrationOutcome::Completed));
    assert_eq!(state.range_meta("fan_speed_percent", RangeMeta::default()).max, 6.0);
}

#[tokio::test]
async fn test_reversed_direction_fails_on_malformed_specification() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new();
    let vendor = MockVendorClient::new().with_specification(DEVICE, malformed_specification());

    let mut state = fan_state(&backend, &["fan_direction"]);
    let outcome = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run(&mut ctx, &ReversedFanDirectionMigration).await
    };

    assert!(outcome.is_failed());
    assert!(!state.is_migration_completed("reversed_fan_direction"));
    assert!(store(&backend).get_value("reversed_fan_direction").unwrap().is_none());
}

#[tokio::test]
async fn test_fan_migrations_in_order() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    let host = MockHostDevice::new().with_capabilities(["onoff", "fan_speed"]);
    let vendor = MockVendorClient::new()
        .with_status(DEVICE, vec![DataPoint::new("switch", true), DataPoint::new("fan_speed_percent", 2)])
        .with_specification(DEVICE, fan_specification(1, 6, 1, &["forward", "reverse"]));

    // pre-dates the declared capability list
    let mut state = fan_state(&backend, &[]);
    let report = {
        let mut ctx = MigrationContext::new(&mut state, &host, &vendor);
        MigrationRunner::run_all(&mut ctx, &FanStrategy.migrations()).await
    };

    assert!(!report.has_failures());
    assert_eq!(
        report.completed().collect::<Vec<_>>(),
        vec!["fan_tuya_capabilities", "reversed_fan_direction", "fan_speed_percent_range"]
    );
    // the range migration sees the codes recorded by the first migration
    assert_eq!(state.range_meta("fan_speed_percent", RangeMeta::default()).max, 6.0);
    assert_eq!(
        state
            .completed_migrations()
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>(),
        vec!["fan_tuya_capabilities", "reversed_fan_direction", "fan_speed_percent_range"]
    );
}
