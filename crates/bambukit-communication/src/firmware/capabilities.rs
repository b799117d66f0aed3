//! Printer capabilities system
//!
//! Which sensors and controls a printer has is decided by its model family
//! alone, never by what telemetry has been seen. Unknown models support
//! nothing.

use bambukit_core::DeviceType;
use serde::Serialize;
use std::collections::HashMap;

/// Feature flags for printers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Feature {
    /// Auxiliary part cooling fan
    AuxFan,
    /// Chamber LED
    ChamberLight,
    /// Chamber exhaust fan
    ChamberFan,
    /// Chamber temperature sensor
    ChamberTemperature,
    /// Reports the current stage
    CurrentStage,
    /// Reports per-layer progress
    PrintLayers,
}

impl Feature {
    /// Every feature, in display order
    pub const ALL: [Feature; 6] = [
        Feature::AuxFan,
        Feature::ChamberLight,
        Feature::ChamberFan,
        Feature::ChamberTemperature,
        Feature::CurrentStage,
        Feature::PrintLayers,
    ];
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuxFan => write!(f, "Aux Fan"),
            Self::ChamberLight => write!(f, "Chamber Light"),
            Self::ChamberFan => write!(f, "Chamber Fan"),
            Self::ChamberTemperature => write!(f, "Chamber Temperature"),
            Self::CurrentStage => write!(f, "Current Stage"),
            Self::PrintLayers => write!(f, "Print Layers"),
        }
    }
}

/// Check whether a printer model has a feature
pub fn supports(device_type: DeviceType, feature: Feature) -> bool {
    match device_type {
        DeviceType::X1 | DeviceType::X1C => true,
        DeviceType::P1P => matches!(
            feature,
            Feature::AuxFan | Feature::ChamberLight | Feature::CurrentStage
        ),
        DeviceType::Unknown => false,
    }
}

/// Trait for querying printer capabilities
pub trait CapabilitiesTrait: Send + Sync {
    /// Check if a feature is supported
    fn has_capability(&self, feature: Feature) -> bool;

    /// Get all supported features
    fn get_capabilities(&self) -> Vec<Feature>;
}

/// Capability table of one printer model
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    device_type: DeviceType,
    capabilities: HashMap<Feature, bool>,
}

impl DeviceCapabilities {
    /// Build the table for a printer model
    pub fn for_device(device_type: DeviceType) -> Self {
        let capabilities = Feature::ALL
            .iter()
            .map(|&feature| (feature, supports(device_type, feature)))
            .collect();
        Self {
            device_type,
            capabilities,
        }
    }

    /// Printer model this table describes
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }
}

impl CapabilitiesTrait for DeviceCapabilities {
    fn has_capability(&self, feature: Feature) -> bool {
        *self.capabilities.get(&feature).unwrap_or(&false)
    }

    fn get_capabilities(&self) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.has_capability(*f))
            .collect()
    }
}
