//! Per-device runtime.
//!
//! A [`DeviceRuntime`] owns one device's state, its class strategy and the
//! host/vendor sinks it was built with. [`DeviceRuntime::start`] runs the
//! migration phase and plans listeners; only then are events accepted. Each
//! event is processed to completion before the next one.
//!
//! [`DeviceRuntime::spawn`] moves the runtime onto its own task fed by a
//! bounded channel, so devices run concurrently while each device stays
//! strictly sequential.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tuya_bridge_core::DataValue;

use crate::error::{DeviceError, DeviceResult};
use crate::event::{DeviceEvent, SettingsEvent};
use crate::migration::{MigrationContext, MigrationReport, MigrationRunner};
use crate::sinks::{HostDevice, SinkError, VendorClient};
use crate::state::DeviceState;
use crate::strategy::{ClassStrategy, Effect, StrategyContext};
use crate::translator::{ListenerTable, Translator};
use crate::vendor::{DataPoint, VendorCommand};

/// An effect that did not take effect.
#[derive(Debug)]
pub struct EffectFailure {
    pub effect: Effect,
    pub error: SinkError,
}

/// What one event did.
#[derive(Debug, Default)]
pub struct EffectReport {
    pub applied: Vec<Effect>,
    pub failures: Vec<EffectFailure>,
}

impl EffectReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Vendor commands sent while handling the event.
    pub fn commands(&self) -> impl Iterator<Item = &VendorCommand> {
        self.applied.iter().filter_map(|e| match e {
            Effect::SendCommand(cmd) => Some(cmd),
            _ => None,
        })
    }
}

/// Translation runtime of one device.
pub struct DeviceRuntime {
    state: DeviceState,
    translator: Translator,
    host: Arc<dyn HostDevice>,
    vendor: Arc<dyn VendorClient>,
    listeners: Option<ListenerTable>,
}

impl DeviceRuntime {
    pub fn new(
        state: DeviceState,
        strategy: Arc<dyn ClassStrategy>,
        host: Arc<dyn HostDevice>,
        vendor: Arc<dyn VendorClient>,
    ) -> Self {
        Self {
            state,
            translator: Translator::new(strategy),
            host,
            vendor,
            listeners: None,
        }
    }

    pub fn device_id(&self) -> &str {
        self.state.device_id()
    }

    pub fn class_id(&self) -> &'static str {
        self.translator.strategy().id()
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn is_started(&self) -> bool {
        self.listeners.is_some()
    }

    /// Listener table, once started.
    pub fn listeners(&self) -> Option<&ListenerTable> {
        self.listeners.as_ref()
    }

    /// Run the migration phase, then plan outgoing listeners.
    ///
    /// Migration failures are reported, not returned. Calling `start` again
    /// re-runs the phase; completed migrations are skipped.
    pub async fn start(&mut self) -> DeviceResult<MigrationReport> {
        let migrations = self.translator.strategy().migrations();
        let report = {
            let mut ctx = MigrationContext::new(&mut self.state, self.host.as_ref(), self.vendor.as_ref());
            MigrationRunner::run_all(&mut ctx, &migrations).await
        };

        self.replan()?;
        tracing::info!(
            device_id = %self.device_id(),
            class = %self.class_id(),
            "Device runtime started"
        );
        Ok(report)
    }

    fn replan(&mut self) -> DeviceResult<()> {
        let table = self.translator.plan_listeners(&self.state, self.host.as_ref())?;
        self.listeners = Some(table);
        Ok(())
    }

    fn ensure_started(&self) -> DeviceResult<&ListenerTable> {
        self.listeners
            .as_ref()
            .ok_or_else(|| DeviceError::NotStarted(self.device_id().to_string()))
    }

    /// Process one event to completion.
    pub async fn handle(&mut self, event: DeviceEvent) -> DeviceResult<EffectReport> {
        match event {
            DeviceEvent::HostWrite { capability, value } => {
                let command = self.on_host_write(&capability, value).await?;
                Ok(EffectReport {
                    applied: command.into_iter().map(Effect::SendCommand).collect(),
                    failures: Vec::new(),
                })
            }
            DeviceEvent::VendorStatus { status, changed } => self.on_status(&status, &changed).await,
            DeviceEvent::SettingsChanged(event) => self.on_settings(&event).await,
        }
    }

    /// Forward a host capability write through its listener.
    ///
    /// Capabilities without a listener are ignored and yield `None`.
    pub async fn on_host_write(&mut self, capability: &str, value: DataValue) -> DeviceResult<Option<VendorCommand>> {
        let Some(mapping) = self.ensure_started()?.listener(capability).copied() else {
            tracing::trace!(device_id = %self.device_id(), "No listener for '{}'", capability);
            return Ok(None);
        };

        let command = self.translator.command_for(&mapping, &value, &self.state)?;
        tracing::debug!(
            device_id = %self.device_id(),
            "Sending {} = {} for '{}'",
            command.code,
            command.value,
            capability
        );
        self.vendor.send_command(self.device_id(), command.clone()).await?;
        Ok(Some(command))
    }

    /// Apply a vendor status push.
    pub async fn on_status(&mut self, status: &[DataPoint], changed: &[String]) -> DeviceResult<EffectReport> {
        self.ensure_started()?;

        let effects = {
            let host = self.host.as_ref();
            let mut effects = self.translator.status_effects(status, &self.state, host);
            let ctx = StrategyContext::new(&self.state, host);
            effects.extend(self.translator.strategy().status_effects(status, changed, &ctx));
            effects
        };

        Ok(self.apply(effects).await)
    }

    /// Apply a host settings change. Capability set changes re-plan the
    /// listeners.
    pub async fn on_settings(&mut self, event: &SettingsEvent) -> DeviceResult<EffectReport> {
        self.ensure_started()?;

        let effects = {
            let ctx = StrategyContext::new(&self.state, self.host.as_ref());
            self.translator.strategy().settings_effects(event, &ctx)
        };
        let replan = effects.iter().any(Effect::alters_capabilities);

        let report = self.apply(effects).await;
        if replan {
            self.replan()?;
        }
        Ok(report)
    }

    async fn apply(&self, effects: Vec<Effect>) -> EffectReport {
        let mut report = EffectReport::default();

        for effect in effects {
            let result = match &effect {
                Effect::SetCapability { capability, value } => {
                    self.host.set_capability_value(capability, value.clone()).await
                }
                Effect::SetSetting { key, value } => self.host.set_setting(key, value.clone()).await,
                Effect::SendCommand(command) => self.vendor.send_command(self.device_id(), command.clone()).await,
                Effect::AddCapability(capability) => self.host.add_capability(capability).await,
                Effect::RemoveCapability(capability) => self.host.remove_capability(capability).await,
                Effect::TriggerFlow(card) => self.host.trigger_flow(card).await,
            };

            match result {
                Ok(()) => report.applied.push(effect),
                Err(error) => {
                    tracing::warn!(device_id = %self.device_id(), "Failed to {}: {}", effect, error);
                    report.failures.push(EffectFailure { effect, error });
                }
            }
        }

        report
    }

    /// Move the runtime onto its own task.
    ///
    /// The task starts the runtime if needed, then handles events until every
    /// sender is dropped, and returns the runtime.
    pub fn spawn(mut self, capacity: usize) -> DeviceHandle {
        let (sender, mut receiver) = mpsc::channel::<DeviceEvent>(capacity.max(1));
        let device_id = self.device_id().to_string();

        let task = tokio::spawn(async move {
            if !self.is_started() {
                if let Err(e) = self.start().await {
                    tracing::error!(device_id = %self.device_id(), "Failed to start device: {}", e);
                }
            }

            while let Some(event) = receiver.recv().await {
                let kind = event.kind();
                match self.handle(event).await {
                    Ok(report) => tracing::debug!(
                        device_id = %self.device_id(),
                        "Handled {}: {} applied, {} failed",
                        kind,
                        report.applied.len(),
                        report.failures.len()
                    ),
                    Err(e) => tracing::warn!(device_id = %self.device_id(), "Failed to handle {}: {}", kind, e),
                }
            }

            tracing::debug!(device_id = %self.device_id(), "Device event loop stopped");
            self
        });

        DeviceHandle {
            device_id,
            sender,
            task,
        }
    }
}

/// Handle to a spawned device runtime.
pub struct DeviceHandle {
    device_id: String,
    sender: mpsc::Sender<DeviceEvent>,
    task: JoinHandle<DeviceRuntime>,
}

impl DeviceHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// A sender that can outlive a borrow of the handle.
    pub fn sender(&self) -> mpsc::Sender<DeviceEvent> {
        self.sender.clone()
    }

    /// Queue an event; waits while the queue is full.
    pub async fn send(&self, event: DeviceEvent) -> DeviceResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| DeviceError::Stopped(self.device_id.clone()))
    }

    /// Stop accepting events, drain the queue and return the runtime.
    pub async fn shutdown(self) -> DeviceResult<DeviceRuntime> {
        let Self {
            device_id,
            sender,
            task,
        } = self;
        drop(sender);
        task.await
            .map_err(|e| DeviceError::Stopped(format!("{}: {}", device_id, e)))
    }
}
