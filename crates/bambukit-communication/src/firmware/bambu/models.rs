//! Bambu sub-models
//!
//! Each sub-model owns one slice of the device state and merges the keys
//! it cares about from a [`Fragment`]. Absent keys leave the slice
//! untouched; malformed keys are logged and skipped.

use super::report::{Fragment, Scalar};
use super::utils::{
    end_time, fan_percentage, float_field, hw_version, int_field, merge_present,
    parse_wifi_signal, speed_name, stage_description, start_time, sw_version, STAGE_IDLE,
};
use bambukit_core::{DeviceType, GcodeState, LightMode};
use chrono::{DateTime, Utc};
use serde::Serialize;

fn display(value: f64) -> i32 {
    value.round() as i32
}

/// Temperature readings in Celsius
///
/// Stored unrounded; accessors round for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Temperature {
    bed: f64,
    bed_target: f64,
    chamber: f64,
    nozzle: f64,
    nozzle_target: f64,
}

impl Temperature {
    /// Merge a fragment
    pub fn update(&mut self, fragment: &Fragment) {
        merge_present(
            &mut self.bed,
            float_field(fragment.bed_temper.as_ref(), "bed_temper"),
        );
        merge_present(
            &mut self.bed_target,
            float_field(fragment.bed_target_temper.as_ref(), "bed_target_temper"),
        );
        merge_present(
            &mut self.chamber,
            float_field(fragment.chamber_temper.as_ref(), "chamber_temper"),
        );
        merge_present(
            &mut self.nozzle,
            float_field(fragment.nozzle_temper.as_ref(), "nozzle_temper"),
        );
        merge_present(
            &mut self.nozzle_target,
            float_field(fragment.nozzle_target_temper.as_ref(), "nozzle_target_temper"),
        );
    }

    /// Bed temperature
    pub fn bed_temp(&self) -> i32 {
        display(self.bed)
    }

    /// Bed target temperature
    pub fn target_bed_temp(&self) -> i32 {
        display(self.bed_target)
    }

    /// Chamber temperature
    pub fn chamber_temp(&self) -> i32 {
        display(self.chamber)
    }

    /// Nozzle temperature
    pub fn nozzle_temp(&self) -> i32 {
        display(self.nozzle)
    }

    /// Nozzle target temperature
    pub fn target_nozzle_temp(&self) -> i32 {
        display(self.nozzle_target)
    }

    /// Unrounded nozzle temperature
    pub fn nozzle_temp_raw(&self) -> f64 {
        self.nozzle
    }

    /// Display values
    pub fn snapshot(&self) -> TemperatureSnapshot {
        TemperatureSnapshot {
            bed: self.bed_temp(),
            bed_target: self.target_bed_temp(),
            chamber: self.chamber_temp(),
            nozzle: self.nozzle_temp(),
            nozzle_target: self.target_nozzle_temp(),
        }
    }
}

/// Rounded temperatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemperatureSnapshot {
    /// Bed
    pub bed: i32,
    /// Bed target
    pub bed_target: i32,
    /// Chamber
    pub chamber: i32,
    /// Nozzle
    pub nozzle: i32,
    /// Nozzle target
    pub nozzle_target: i32,
}

/// LED channel states
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Lights {
    chamber_light: LightMode,
    work_light: LightMode,
}

impl Lights {
    /// LED node controlling the chamber light
    pub const CHAMBER_LIGHT: &'static str = "chamber_light";
    /// LED node controlling the toolhead work light
    pub const WORK_LIGHT: &'static str = "work_light";

    /// Merge a fragment
    pub fn update(&mut self, fragment: &Fragment) {
        merge_present(
            &mut self.chamber_light,
            Self::mode(fragment, Self::CHAMBER_LIGHT),
        );
        merge_present(&mut self.work_light, Self::mode(fragment, Self::WORK_LIGHT));
    }

    fn mode(fragment: &Fragment, node: &str) -> Option<LightMode> {
        let raw = fragment.light(node)?.mode.as_deref()?;
        match LightMode::from_report(raw) {
            LightMode::Unknown => {
                tracing::debug!("Ignoring unrecognised mode for {}: {}", node, raw);
                None
            }
            mode => Some(mode),
        }
    }

    /// Chamber light mode
    pub fn chamber_light(&self) -> LightMode {
        self.chamber_light
    }

    /// Work light mode
    pub fn work_light(&self) -> LightMode {
        self.work_light
    }
}

/// One fan channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Fan {
    step: u32,
    percentage: u8,
}

impl Fan {
    fn update(&mut self, raw: Option<i64>) {
        let Some(step) = raw else { return };
        if let Some(percentage) = fan_percentage(step) {
            self.step = step as u32;
            self.percentage = percentage;
        }
    }

    /// Raw firmware step (0-15)
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Speed as a percentage
    pub fn percentage(&self) -> u8 {
        self.percentage
    }
}

/// Fan channels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fans {
    aux: Fan,
    chamber: Fan,
    part_cooling: Fan,
    heatbreak: Fan,
}

impl Fans {
    /// Merge a fragment
    pub fn update(&mut self, fragment: &Fragment) {
        fn step(value: Option<&Scalar>, key: &str) -> Option<i64> {
            int_field(value, key, 0..=i64::from(u32::MAX))
        }
        self.aux
            .update(step(fragment.big_fan1_speed.as_ref(), "big_fan1_speed"));
        self.chamber
            .update(step(fragment.big_fan2_speed.as_ref(), "big_fan2_speed"));
        self.part_cooling
            .update(step(fragment.cooling_fan_speed.as_ref(), "cooling_fan_speed"));
        self.heatbreak.update(step(
            fragment.heatbreak_fan_speed.as_ref(),
            "heatbreak_fan_speed",
        ));
    }

    /// Auxiliary fan
    pub fn aux(&self) -> Fan {
        self.aux
    }

    /// Chamber fan
    pub fn chamber(&self) -> Fan {
        self.chamber
    }

    /// Part cooling fan
    pub fn part_cooling(&self) -> Fan {
        self.part_cooling
    }

    /// Heatbreak fan
    pub fn heatbreak(&self) -> Fan {
        self.heatbreak
    }
}

/// Speed profile
#[derive(Debug, Clone, PartialEq)]
pub struct Speed {
    level: u8,
    modifier: u32,
}

impl Default for Speed {
    fn default() -> Self {
        Self {
            level: 2,
            modifier: 100,
        }
    }
}

impl Speed {
    /// Merge a fragment
    pub fn update(&mut self, fragment: &Fragment) {
        merge_present(
            &mut self.level,
            int_field(fragment.spd_lvl.as_ref(), "spd_lvl", 0..=4).map(|v| v as u8),
        );
        merge_present(
            &mut self.modifier,
            int_field(fragment.spd_mag.as_ref(), "spd_mag", 0..=i64::from(u32::MAX))
                .map(|v| v as u32),
        );
    }

    /// Profile level (0-4)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Profile name
    pub fn name(&self) -> &'static str {
        speed_name(self.level)
    }

    /// Speed percentage
    pub fn modifier(&self) -> u32 {
        self.modifier
    }

    /// Display values
    pub fn snapshot(&self) -> SpeedSnapshot {
        SpeedSnapshot {
            level: self.level,
            name: self.name().to_string(),
            modifier: self.modifier,
        }
    }
}

/// Speed profile for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeedSnapshot {
    /// Level
    pub level: u8,
    /// Name
    pub name: String,
    /// Percentage
    pub modifier: u32,
}

/// Current printer stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageAction {
    id: i64,
}

impl Default for StageAction {
    fn default() -> Self {
        Self { id: STAGE_IDLE }
    }
}

impl StageAction {
    /// Merge a fragment
    pub fn update(&mut self, fragment: &Fragment) {
        merge_present(
            &mut self.id,
            int_field(fragment.stg_cur.as_ref(), "stg_cur", ..),
        );
    }

    /// Stage id
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Stage description
    pub fn description(&self) -> &'static str {
        stage_description(self.id)
    }

    /// Display values
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            id: self.id,
            description: self.description().to_string(),
        }
    }
}

/// Stage for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    /// Stage id
    pub id: i64,
    /// Description
    pub description: String,
}

/// Printer identity and job progress
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    device_type: DeviceType,
    serial: String,
    wifi_signal: i32,
    print_percentage: u8,
    gcode_state: GcodeState,
    remaining_time: i64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    current_layer: u32,
    total_layers: u32,
    hw_version: Option<String>,
    sw_version: Option<String>,
}

impl Info {
    /// Create identity for a printer
    pub fn new(device_type: DeviceType, serial: impl Into<String>) -> Self {
        Self {
            device_type,
            serial: serial.into(),
            wifi_signal: 0,
            print_percentage: 0,
            gcode_state: GcodeState::Unknown,
            remaining_time: 0,
            start_time: None,
            end_time: None,
            current_layer: 0,
            total_layers: 0,
            hw_version: None,
            sw_version: None,
        }
    }

    /// Merge a fragment observed at `now`
    pub fn update(&mut self, fragment: &Fragment, now: DateTime<Utc>) {
        if let Some(raw) = fragment.wifi_signal.as_ref() {
            let parsed = match raw.as_str() {
                Some(text) => parse_wifi_signal(text),
                None => raw.as_i64().and_then(|v| i32::try_from(v).ok()),
            };
            if parsed.is_none() {
                tracing::debug!("Ignoring malformed wifi_signal: {:?}", raw);
            }
            merge_present(&mut self.wifi_signal, parsed);
        }

        merge_present(
            &mut self.print_percentage,
            int_field(fragment.mc_percent.as_ref(), "mc_percent", 0..=100).map(|v| v as u8),
        );

        if let Some(raw) = fragment.gcode_state.as_deref() {
            match GcodeState::from_report(raw) {
                GcodeState::Unknown => {
                    tracing::debug!("Ignoring unrecognised gcode_state: {}", raw)
                }
                state => self.gcode_state = state,
            }
        }

        if let Some(remaining) =
            int_field(fragment.mc_remaining_time.as_ref(), "mc_remaining_time", ..)
        {
            self.remaining_time = remaining;
            self.end_time = end_time(remaining, now);
        }

        if let Some(secs) =
            int_field(fragment.gcode_start_time.as_ref(), "gcode_start_time", ..)
        {
            self.start_time = start_time(secs);
        }

        merge_present(
            &mut self.current_layer,
            int_field(fragment.layer_num.as_ref(), "layer_num", 0..=i64::from(u32::MAX))
                .map(|v| v as u32),
        );
        merge_present(
            &mut self.total_layers,
            int_field(
                fragment.total_layer_num.as_ref(),
                "total_layer_num",
                0..=i64::from(u32::MAX),
            )
            .map(|v| v as u32),
        );

        let modules = fragment.modules();
        merge_present(&mut self.hw_version, hw_version(modules).map(Some));
        merge_present(&mut self.sw_version, sw_version(modules).map(Some));
    }

    /// Replace a placeholder device type
    ///
    /// Returns false, leaving the type untouched, once the type is known.
    pub(crate) fn resolve_device_type(&mut self, device_type: DeviceType) -> bool {
        if self.device_type.is_known() || !device_type.is_known() {
            return false;
        }
        self.device_type = device_type;
        true
    }

    /// Printer model
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Printer serial
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Wi-Fi signal in dBm
    pub fn wifi_signal(&self) -> i32 {
        self.wifi_signal
    }

    /// Print progress (0-100)
    pub fn print_percentage(&self) -> u8 {
        self.print_percentage
    }

    /// Job phase
    pub fn gcode_state(&self) -> GcodeState {
        self.gcode_state
    }

    /// Remaining minutes
    pub fn remaining_time(&self) -> i64 {
        self.remaining_time
    }

    /// Job start
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Projected job end
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Current layer
    pub fn current_layer(&self) -> u32 {
        self.current_layer
    }

    /// Total layers
    pub fn total_layers(&self) -> u32 {
        self.total_layers
    }

    /// Main controller hardware version
    pub fn hw_version(&self) -> Option<&str> {
        self.hw_version.as_deref()
    }

    /// Firmware version
    pub fn sw_version(&self) -> Option<&str> {
        self.sw_version.as_deref()
    }

    /// Display values
    pub fn snapshot(&self) -> InfoSnapshot {
        InfoSnapshot {
            device_type: self.device_type,
            serial: self.serial.clone(),
            wifi_signal: self.wifi_signal,
            print_percentage: self.print_percentage,
            gcode_state: self.gcode_state.to_string(),
            remaining_time: self.remaining_time,
            start_time: self.start_time,
            end_time: self.end_time,
            current_layer: self.current_layer,
            total_layers: self.total_layers,
            hw_version: self.hw_version.clone(),
            sw_version: self.sw_version.clone(),
        }
    }
}

/// Identity and progress for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoSnapshot {
    /// Model
    pub device_type: DeviceType,
    /// Serial
    pub serial: String,
    /// Wi-Fi dBm
    pub wifi_signal: i32,
    /// Progress
    pub print_percentage: u8,
    /// Job phase
    pub gcode_state: String,
    /// Remaining minutes
    pub remaining_time: i64,
    /// Job start
    pub start_time: Option<DateTime<Utc>>,
    /// Projected end
    pub end_time: Option<DateTime<Utc>>,
    /// Current layer
    pub current_layer: u32,
    /// Total layers
    pub total_layers: u32,
    /// Controller hardware version
    pub hw_version: Option<String>,
    /// Firmware version
    pub sw_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fragment(value: serde_json::Value) -> Fragment {
        Fragment::from_value(value).unwrap()
    }

    #[test]
    fn test_temperature_rounds_at_boundary() {
        let mut temperature = Temperature::default();
        temperature.update(&fragment(json!({"nozzle_temper": 219.6, "bed_temper": "59.4"})));

        assert_eq!(temperature.nozzle_temp(), 220);
        assert_eq!(temperature.nozzle_temp_raw(), 219.6);
        assert_eq!(temperature.bed_temp(), 59);
        assert_eq!(temperature.chamber_temp(), 0);
    }

    #[test]
    fn test_malformed_temperature_keeps_previous() {
        let mut temperature = Temperature::default();
        temperature.update(&fragment(json!({"bed_temper": 60})));
        temperature.update(&fragment(json!({"bed_temper": "hot"})));
        assert_eq!(temperature.bed_temp(), 60);
    }

    #[test]
    fn test_lights_lookup_by_node() {
        let mut lights = Lights::default();
        lights.update(&fragment(json!({
            "lights_report": [
                {"node": "work_light", "mode": "flashing"},
                {"node": "chamber_light", "mode": "on"}
            ]
        })));
        assert_eq!(lights.chamber_light(), LightMode::On);
        assert_eq!(lights.work_light(), LightMode::Flashing);

        lights.update(&fragment(json!({
            "lights_report": [{"node": "chamber_light", "mode": "off"}]
        })));
        assert_eq!(lights.chamber_light(), LightMode::Off);
        assert_eq!(lights.work_light(), LightMode::Flashing);
    }

    #[test]
    fn test_fans() {
        let mut fans = Fans::default();
        fans.update(&fragment(json!({"cooling_fan_speed": "7", "big_fan1_speed": 15})));
        assert_eq!(fans.part_cooling().percentage(), 50);
        assert_eq!(fans.part_cooling().step(), 7);
        assert_eq!(fans.aux().percentage(), 100);

        fans.update(&fragment(json!({"cooling_fan_speed": -3})));
        assert_eq!(fans.part_cooling().percentage(), 50);
    }

    #[test]
    fn test_speed_bounds() {
        let mut speed = Speed::default();
        assert_eq!(speed.name(), "standard");
        assert_eq!(speed.modifier(), 100);

        speed.update(&fragment(json!({"spd_lvl": 4, "spd_mag": 166})));
        assert_eq!(speed.name(), "ludicrous");
        assert_eq!(speed.modifier(), 166);

        speed.update(&fragment(json!({"spd_lvl": 9})));
        assert_eq!(speed.level(), 4);
    }

    #[test]
    fn test_stage_defaults_to_idle() {
        let mut stage = StageAction::default();
        assert_eq!(stage.id(), 255);
        assert_eq!(stage.description(), "Idle");

        stage.update(&fragment(json!({"stg_cur": 2})));
        assert_eq!(stage.description(), "Heatbed Preheating");
    }

    #[test]
    fn test_info_progress_and_times() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut info = Info::new(DeviceType::X1C, "00M00A000000001");
        info.update(
            &fragment(json!({
                "wifi_signal": "-45dBm",
                "mc_percent": 42,
                "gcode_state": "RUNNING",
                "mc_remaining_time": 30,
                "gcode_start_time": "1714560000",
                "layer_num": 12,
                "total_layer_num": 200
            })),
            now,
        );

        assert_eq!(info.wifi_signal(), -45);
        assert_eq!(info.print_percentage(), 42);
        assert_eq!(info.gcode_state(), GcodeState::Running);
        assert_eq!(
            info.end_time(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
        );
        assert_eq!(info.start_time(), Utc.timestamp_opt(1_714_560_000, 0).single());
        assert_eq!(info.current_layer(), 12);

        // A later fragment without these keys changes nothing
        info.update(&fragment(json!({"mc_percent": 43})), now);
        assert_eq!(info.gcode_state(), GcodeState::Running);
        assert_eq!(info.total_layers(), 200);
        assert!(info.end_time().is_some());

        info.update(&fragment(json!({"mc_remaining_time": 0})), now);
        assert_eq!(info.end_time(), None);
    }

    #[test]
    fn test_info_versions_from_modules() {
        let mut info = Info::new(DeviceType::P1P, "01S00A000000001");
        info.update(
            &fragment(json!({
                "module": [
                    {"name": "ota", "sw_ver": "01.04.00.00"},
                    {"name": "mc", "hw_ver": "AP04"}
                ]
            })),
            Utc::now(),
        );
        assert_eq!(info.hw_version(), Some("AP04"));
        assert_eq!(info.sw_version(), Some("01.04.00.00"));

        info.update(&fragment(json!({"module": []})), Utc::now());
        assert_eq!(info.sw_version(), Some("01.04.00.00"));
    }

    #[test]
    fn test_device_type_resolves_once() {
        let mut info = Info::new(DeviceType::Unknown, "s");
        assert!(!info.resolve_device_type(DeviceType::Unknown));
        assert!(info.resolve_device_type(DeviceType::P1P));
        assert!(!info.resolve_device_type(DeviceType::X1C));
        assert_eq!(info.device_type(), DeviceType::P1P);
    }
}
