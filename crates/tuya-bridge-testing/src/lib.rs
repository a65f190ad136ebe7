//! Testing utilities for the Tuya bridge
//!
//! This crate provides:
//! - An in-memory host device recording capability, setting and flow writes
//! - A scripted vendor client with canned status and specifications
//! - Vendor payload fixtures

pub mod fixtures;
pub mod host;
pub mod vendor;

pub use host::MockHostDevice;
pub use vendor::MockVendorClient;

use tuya_bridge_core::config::BridgeConfig;

/// Install a debug-level subscriber for test output.
pub fn init_test_logging() {
    let config = BridgeConfig {
        log_directive: "tuya_bridge=debug".to_string(),
        ..BridgeConfig::default()
    };
    tuya_bridge_core::logging::init(&config);
}
