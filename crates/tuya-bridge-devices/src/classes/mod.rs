//! Built-in device classes and the registry that classifies discovered
//! devices.

pub mod air_purifier;
pub mod fan;
pub mod window_coverings;

use std::sync::Arc;

use crate::error::{DeviceError, DeviceResult};
use crate::pairing::DiscoveredDevice;
use crate::strategy::ClassStrategy;

pub use air_purifier::AIR_PURIFIER;
pub use fan::{FanStrategy, FAN};
pub use window_coverings::{WindowCoveringsStrategy, WINDOW_COVERINGS};

/// Registered device classes, each table validated on registration.
#[derive(Clone, Default)]
pub struct ClassRegistry {
    classes: Vec<Arc<dyn ClassStrategy>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the air purifier, fan and window coverings classes.
    pub fn with_builtin_classes() -> DeviceResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(air_purifier::strategy()))?;
        registry.register(Arc::new(FanStrategy))?;
        registry.register(Arc::new(WindowCoveringsStrategy))?;
        Ok(registry)
    }

    pub fn register(&mut self, strategy: Arc<dyn ClassStrategy>) -> DeviceResult<()> {
        let descriptor = strategy.descriptor();
        descriptor.validate()?;

        if self.get(descriptor.id).is_some() {
            return Err(DeviceError::InvalidDescriptor {
                class: descriptor.id.to_string(),
                reason: "class already registered".to_string(),
            });
        }

        tracing::debug!(
            "Registered device class '{}' ({} mappings)",
            descriptor.id,
            descriptor.mappings.len()
        );
        self.classes.push(strategy);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ClassStrategy>> {
        self.classes.iter().find(|c| c.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.classes.iter().map(|c| c.id()).collect()
    }

    /// Class claiming a discovered device.
    ///
    /// Product allow-lists are consulted across every class before any
    /// category match.
    pub fn classify(&self, device: &DiscoveredDevice) -> Option<Arc<dyn ClassStrategy>> {
        self.classes
            .iter()
            .find(|c| c.descriptor().product_ids.contains(&device.product_id.as_str()))
            .or_else(|| self.classes.iter().find(|c| c.matches(device)))
            .cloned()
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_classes() {
        let registry = ClassRegistry::with_builtin_classes().unwrap();
        assert_eq!(registry.ids(), vec!["air_purifier", "fan", "window_coverings"]);
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let mut registry = ClassRegistry::with_builtin_classes().unwrap();
        assert!(registry.register(Arc::new(FanStrategy)).is_err());
    }

    #[test]
    fn test_classify() {
        let registry = ClassRegistry::with_builtin_classes().unwrap();
        let classify = |device: DiscoveredDevice| registry.classify(&device).map(|c| c.id());

        assert_eq!(classify(DiscoveredDevice::new("a", "kj")), Some("air_purifier"));
        assert_eq!(classify(DiscoveredDevice::new("b", "fsd")), Some("fan"));
        assert_eq!(classify(DiscoveredDevice::new("c", "cl")), Some("window_coverings"));
        assert_eq!(
            classify(DiscoveredDevice::new("d", "fs").with_product_id("vpb3fd5rhtgd7b4t")),
            Some("air_purifier")
        );
        assert_eq!(
            classify(DiscoveredDevice::new("e", "fs").with_product_id("lfkr93x0ukp5gaia")),
            Some("window_coverings")
        );
        assert_eq!(classify(DiscoveredDevice::new("f", "dj")), None);
    }
}
