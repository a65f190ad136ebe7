//! Capability translation between vendor data points and host capabilities.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`mapping`] | Static per-class tables of vendor code to host capability |
//! | [`normalizer`] | Range normalization with step snapping and clamping |
//! | [`translator`] | Listener planning, status and command conversion |
//! | [`migration`] | Idempotent per-device migrations |
//! | [`pairing`] | Discovery filter and initial property builder |
//! | [`classes`] | Air purifier, fan and window coverings classes |
//! | [`runtime`] | Per-device event loop |
//! | [`service`] | Pairing and event routing across devices |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tuya_bridge_devices::{BridgeService, ClassRegistry, DeviceEvent, DiscoveredDevice};
//! use tuya_bridge_devices::sinks::{HostDevice, VendorClient};
//! use tuya_bridge_storage::MemoryBackend;
//!
//! # async fn run(vendor: Arc<dyn VendorClient>, host: Arc<dyn HostDevice>) -> anyhow::Result<()> {
//! let service = BridgeService::new(
//!     Arc::new(MemoryBackend::default()),
//!     ClassRegistry::with_builtin_classes()?,
//!     vendor,
//! );
//!
//! let paired = service.pair(&DiscoveredDevice::new("bf01", "fs"))?;
//! service.attach(&paired.device_id, paired.class_id, host).await?;
//! service
//!     .dispatch("bf01", DeviceEvent::host_write("fan_speed", 0.5))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod classes;
pub mod error;
pub mod event;
pub mod mapping;
pub mod migration;
pub mod normalizer;
pub mod pairing;
pub mod runtime;
pub mod service;
pub mod sinks;
pub mod state;
pub mod strategy;
pub mod translator;
pub mod vendor;

pub use classes::{ClassRegistry, FanStrategy, WindowCoveringsStrategy};
pub use error::{DeviceError, DeviceResult};
pub use event::{DeviceEvent, SettingsEvent};
pub use mapping::{CodeMapping, Conversion, DeviceClassDescriptor, Fidelity};
pub use migration::{Migration, MigrationContext, MigrationOutcome, MigrationReport, MigrationRunner};
pub use normalizer::{to_normalized, to_vendor_range, RangeMeta};
pub use pairing::{DiscoveredDevice, PairingProperties};
pub use runtime::{DeviceHandle, DeviceRuntime, EffectReport};
pub use service::{BridgeService, PairedDevice};
pub use sinks::{CapabilityOptions, HostDevice, SinkError, VendorClient};
pub use state::DeviceState;
pub use strategy::{ClassStrategy, Effect, TableStrategy};
pub use translator::{ListenerState, ListenerTable, Translator};
pub use vendor::{DataPoint, DeviceSpecification, SpecEntry, VendorCommand};

pub use tuya_bridge_core::DataValue;
