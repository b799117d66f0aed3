//! Bambu device model
//!
//! The single source of truth for one printer. Every fragment is handed to
//! every sub-model, each of which takes only the keys it owns.

use super::ams::{AmsRegistry, AmsSnapshot};
use super::models::{
    Fans, Info, InfoSnapshot, Lights, Speed, SpeedSnapshot, StageAction, StageSnapshot,
    Temperature, TemperatureSnapshot,
};
use super::report::Fragment;
use super::utils::printer_type;
use crate::firmware::capabilities::{supports, Feature};
use bambukit_core::{DeviceType, GcodeState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a single update changed beyond plain field values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// AMS indices that became known for the first time
    pub discovered_ams: Vec<u8>,
    /// Set when this fragment replaced a placeholder device type
    pub device_type_resolved: Option<DeviceType>,
    /// Set when the job phase changed, as `(from, to)`
    pub gcode_state_changed: Option<(GcodeState, GcodeState)>,
}

impl UpdateSummary {
    /// Check whether nothing notable happened
    pub fn is_empty(&self) -> bool {
        self.discovered_ams.is_empty()
            && self.device_type_resolved.is_none()
            && self.gcode_state_changed.is_none()
    }
}

/// Live model of one printer
#[derive(Debug, Clone)]
pub struct Device {
    temperature: Temperature,
    lights: Lights,
    fans: Fans,
    speed: Speed,
    stage: StageAction,
    info: Info,
    ams: AmsRegistry,
}

impl Device {
    /// Create a model for a printer
    ///
    /// Pass [`DeviceType::Unknown`] when the model is not known up front;
    /// the first module list that identifies it fills it in.
    pub fn new(device_type: DeviceType, serial: impl Into<String>) -> Self {
        Self {
            temperature: Temperature::default(),
            lights: Lights::default(),
            fans: Fans::default(),
            speed: Speed::default(),
            stage: StageAction::default(),
            info: Info::new(device_type, serial),
            ams: AmsRegistry::new(),
        }
    }

    /// Merge a fragment observed now
    pub fn update(&mut self, fragment: &Fragment) -> UpdateSummary {
        self.update_at(fragment, Utc::now())
    }

    /// Merge a fragment observed at `now`
    ///
    /// Never fails: unknown keys are ignored and malformed values keep the
    /// previous state.
    pub fn update_at(&mut self, fragment: &Fragment, now: DateTime<Utc>) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        let previous_state = self.info.gcode_state();

        if let Some(detected) = printer_type(fragment.modules()) {
            if self.info.resolve_device_type(detected) {
                tracing::info!("Printer {} identified as {}", self.info.serial(), detected);
                summary.device_type_resolved = Some(detected);
            }
        }

        self.temperature.update(fragment);
        self.lights.update(fragment);
        self.fans.update(fragment);
        self.info.update(fragment, now);
        self.speed.update(fragment);
        self.stage.update(fragment);
        summary.discovered_ams = self.ams.update(fragment);

        let current_state = self.info.gcode_state();
        if current_state != previous_state {
            summary.gcode_state_changed = Some((previous_state, current_state));
        }

        summary
    }

    /// Check whether this printer has a feature
    pub fn supports_feature(&self, feature: Feature) -> bool {
        supports(self.info.device_type(), feature)
    }

    /// Printer model
    pub fn device_type(&self) -> DeviceType {
        self.info.device_type()
    }

    /// Printer serial
    pub fn serial(&self) -> &str {
        self.info.serial()
    }

    /// Temperatures
    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    /// LEDs
    pub fn lights(&self) -> &Lights {
        &self.lights
    }

    /// Fans
    pub fn fans(&self) -> &Fans {
        &self.fans
    }

    /// Speed profile
    pub fn speed(&self) -> &Speed {
        &self.speed
    }

    /// Current stage
    pub fn stage(&self) -> &StageAction {
        &self.stage
    }

    /// Identity and job progress
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// AMS registry
    pub fn ams(&self) -> &AmsRegistry {
        &self.ams
    }

    /// Owned copy of the model with display values
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            info: self.info.snapshot(),
            temperature: self.temperature.snapshot(),
            lights: self.lights.clone(),
            fans: self.fans.clone(),
            speed: self.speed.snapshot(),
            stage: self.stage.snapshot(),
            ams: self.ams.snapshot(),
            features: Feature::ALL
                .iter()
                .copied()
                .filter(|f| self.supports_feature(*f))
                .collect(),
        }
    }
}

/// Serializable view of a [`Device`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Identity and progress
    pub info: InfoSnapshot,
    /// Temperatures
    pub temperature: TemperatureSnapshot,
    /// LEDs
    pub lights: Lights,
    /// Fans
    pub fans: Fans,
    /// Speed profile
    pub speed: SpeedSnapshot,
    /// Stage
    pub stage: StageSnapshot,
    /// AMS units
    pub ams: AmsSnapshot,
    /// Supported features
    pub features: Vec<Feature>,
}
