//! Idempotent per-device migrations.
//!
//! A migration repairs or backfills the persisted state of an already paired
//! device. Each named migration runs at most once per device: success appends
//! a completion marker, failure leaves no marker so the next startup retries.
//! The phase runs every registered migration in declared order and a failure
//! never stops its siblings.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::error::DeviceError;
use crate::sinks::{HostDevice, VendorClient};
use crate::state::DeviceState;
use crate::vendor::DeviceSpecification;

/// Why a migration did not complete.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration '{name}' failed: {source}")]
    Procedure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Migration '{name}' completed but its marker was not persisted: {source}")]
    Persist {
        name: String,
        #[source]
        source: DeviceError,
    },
}

/// Everything a migration procedure may touch.
pub struct MigrationContext<'a> {
    pub state: &'a mut DeviceState,
    pub host: &'a dyn HostDevice,
    pub vendor: &'a dyn VendorClient,
}

impl<'a> MigrationContext<'a> {
    pub fn new(state: &'a mut DeviceState, host: &'a dyn HostDevice, vendor: &'a dyn VendorClient) -> Self {
        Self { state, host, vendor }
    }

    pub fn device_id(&self) -> &str {
        self.state.device_id()
    }

    /// Vendor specification, or `None` when retrieval fails.
    pub async fn specification(&self) -> Option<DeviceSpecification> {
        match self.vendor.get_specification(self.state.device_id()).await {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::info!(device_id = %self.state.device_id(), "Device specification retrieval failed: {}", e);
                None
            }
        }
    }
}

/// A named, one-shot procedure.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &'static str;

    async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> anyhow::Result<()>;
}

/// Result of attempting one migration.
#[derive(Debug)]
pub enum MigrationOutcome {
    /// Marker already present; the procedure did not run.
    Skipped,
    Completed,
    Failed(MigrationError),
}

impl MigrationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Outcomes of one migration phase, in execution order.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub outcomes: Vec<(&'static str, MigrationOutcome)>,
}

impl MigrationReport {
    pub fn outcome(&self, name: &str) -> Option<&MigrationOutcome> {
        self.outcomes.iter().find(|(n, _)| *n == name).map(|(_, o)| o)
    }

    pub fn completed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, MigrationOutcome::Completed))
            .map(|(n, _)| *n)
    }

    pub fn failed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_failed())
            .map(|(n, _)| *n)
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Runs migrations against one device.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Run one migration unless its marker is present.
    pub async fn run(ctx: &mut MigrationContext<'_>, migration: &dyn Migration) -> MigrationOutcome {
        let name = migration.name();
        if ctx.state.is_migration_completed(name) {
            tracing::trace!(device_id = %ctx.device_id(), "Migration '{}' already completed", name);
            return MigrationOutcome::Skipped;
        }

        tracing::info!(device_id = %ctx.device_id(), "Running migration '{}'", name);
        if let Err(source) = migration.migrate(ctx).await {
            let err = MigrationError::Procedure {
                name: name.to_string(),
                source,
            };
            tracing::error!(device_id = %ctx.device_id(), "{}", err);
            return MigrationOutcome::Failed(err);
        }

        if let Err(source) = ctx.state.mark_migration_completed(name) {
            let err = MigrationError::Persist {
                name: name.to_string(),
                source,
            };
            tracing::error!(device_id = %ctx.device_id(), "{}", err);
            return MigrationOutcome::Failed(err);
        }

        MigrationOutcome::Completed
    }

    /// Run every migration once, sequentially, in order.
    pub async fn run_all(ctx: &mut MigrationContext<'_>, migrations: &[Box<dyn Migration>]) -> MigrationReport {
        let mut report = MigrationReport::default();
        for migration in migrations {
            let outcome = Self::run(ctx, migration.as_ref()).await;
            report.outcomes.push((migration.name(), outcome));
        }

        if report.has_failures() {
            tracing::warn!(
                device_id = %ctx.device_id(),
                "Migrations failed and will be retried on next start: {:?}",
                report.failed().collect::<Vec<_>>()
            );
        }
        report
    }
}
