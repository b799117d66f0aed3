//! Bambu field derivation helpers
//!
//! Pure functions that turn raw telemetry values into typed model values.

use super::report::{ModuleReport, Scalar};
use bambukit_core::DeviceType;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::ops::RangeBounds;

/// Fan step (0-15) to percentage, rounded up to the next 10%
pub const FAN_PERCENTAGES: [u8; 16] = [0, 10, 20, 20, 30, 40, 40, 50, 60, 60, 70, 80, 80, 90, 100, 100];

/// Stage id meaning "no stage"
pub const STAGE_IDLE: i64 = 255;

/// Firmware stage descriptions, indexed by `stg_cur`
pub const STAGE_NAMES: [&str; 36] = [
    "Printing",
    "Auto Bed Leveling",
    "Heatbed Preheating",
    "Sweeping XY Mech Mode",
    "Changing Filament",
    "M400 Pause",
    "Paused Due To Filament Runout",
    "Heating Hotend",
    "Calibrating Extrusion",
    "Scanning Bed Surface",
    "Inspecting First Layer",
    "Identifying Build Plate Type",
    "Calibrating Micro Lidar",
    "Homing Toolhead",
    "Cleaning Nozzle Tip",
    "Checking Extruder Temperature",
    "Paused By User",
    "Paused Due To Front Cover Falling",
    "Calibrating Micro Lidar",
    "Calibrating Extrusion Flow",
    "Paused Due To Nozzle Temperature Malfunction",
    "Paused Due To Heat Bed Temperature Malfunction",
    "Filament Unloading",
    "Skip Step Pause",
    "Filament Loading",
    "Motor Noise Calibration",
    "Paused Due To AMS Lost",
    "Paused Due To Low Heatbreak Fan Speed",
    "Paused Due To Chamber Temperature Control Error",
    "Cooling Chamber",
    "Paused By Inserted Gcode",
    "Motor Noise Showoff",
    "Nozzle Filament Covered Detected Pause",
    "Cutter Error Pause",
    "First Layer Error Pause",
    "Nozzle Clog Pause",
];

/// Convert a raw fan step to a percentage
///
/// Steps above 15 saturate at 100%. Negative steps are malformed.
pub fn fan_percentage(step: i64) -> Option<u8> {
    match step {
        s if s < 0 => None,
        s if s >= FAN_PERCENTAGES.len() as i64 => Some(100),
        s => Some(FAN_PERCENTAGES[s as usize]),
    }
}

/// Name of a speed profile level
pub fn speed_name(level: u8) -> &'static str {
    match level {
        1 => "silent",
        3 => "sport",
        4 => "ludicrous",
        _ => "standard",
    }
}

/// Description of a stage id
pub fn stage_description(id: i64) -> &'static str {
    match id {
        -1 | STAGE_IDLE => "Idle",
        0..=35 => STAGE_NAMES[id as usize],
        _ => "Unknown",
    }
}

/// Find a module by name
pub fn find_module<'a>(modules: &'a [ModuleReport], name: &str) -> Option<&'a ModuleReport> {
    modules.iter().find(|m| m.is_named(name))
}

/// Identify the printer family from the module list
///
/// Returns `None` when the list does not identify a supported model.
pub fn printer_type(modules: &[ModuleReport]) -> Option<DeviceType> {
    for module in modules {
        let hw_ver = module.hw_ver.as_deref().unwrap_or_default();
        if module.is_named("esp32")
            && hw_ver == "AP04"
            && module.project_name.as_deref() == Some("C11")
        {
            return Some(DeviceType::P1P);
        }
        if hw_ver.starts_with("AP05") {
            return Some(DeviceType::X1C);
        }
    }
    None
}

/// Hardware version of the main controller (`mc` module)
pub fn hw_version(modules: &[ModuleReport]) -> Option<String> {
    find_module(modules, "mc").and_then(|m| m.hw_ver.clone())
}

/// Firmware version (`ota` module)
pub fn sw_version(modules: &[ModuleReport]) -> Option<String> {
    find_module(modules, "ota").and_then(|m| m.sw_ver.clone())
}

/// Parse a Wi-Fi signal such as `-45dBm`
pub fn parse_wifi_signal(value: &str) -> Option<i32> {
    let value = value.trim();
    let number = value
        .strip_suffix("dBm")
        .or_else(|| value.strip_suffix("dbm"))
        .unwrap_or(value);
    number.trim().parse::<i32>().ok()
}

/// Job start instant from unix seconds; 0 means no start time
pub fn start_time(unix_seconds: i64) -> Option<DateTime<Utc>> {
    if unix_seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(unix_seconds, 0)
}

/// Projected job end, rounded to the nearest minute
///
/// Returns `None` unless there is time remaining.
pub fn end_time(remaining_minutes: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if remaining_minutes <= 0 {
        return None;
    }
    let end = now.checked_add_signed(TimeDelta::try_minutes(remaining_minutes)?)?;
    end.duration_round(TimeDelta::minutes(1)).ok()
}

/// Overwrite `slot` only when a value was received
///
/// Returns true when the slot was written.
pub fn merge_present<T>(slot: &mut T, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// Coerce a present field to a float, logging it when malformed
pub(crate) fn float_field(value: Option<&Scalar>, key: &str) -> Option<f64> {
    let scalar = value?;
    let parsed = scalar.as_f64();
    if parsed.is_none() {
        tracing::debug!("Ignoring malformed {}: {:?}", key, scalar);
    }
    parsed
}

/// Coerce a present field to an integer within `range`, logging it when malformed
pub(crate) fn int_field<R>(value: Option<&Scalar>, key: &str, range: R) -> Option<i64>
where
    R: RangeBounds<i64>,
{
    let scalar = value?;
    let parsed = scalar.as_i64().filter(|v| range.contains(v));
    if parsed.is_none() {
        tracing::debug!("Ignoring malformed {}: {:?}", key, scalar);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn module(name: &str, hw_ver: &str, project_name: &str) -> ModuleReport {
        ModuleReport {
            name: Some(name.to_string()),
            hw_ver: Some(hw_ver.to_string()),
            project_name: Some(project_name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fan_percentage_table() {
        assert_eq!(fan_percentage(0), Some(0));
        assert_eq!(fan_percentage(3), Some(20));
        assert_eq!(fan_percentage(7), Some(50));
        assert_eq!(fan_percentage(15), Some(100));
        assert_eq!(fan_percentage(40), Some(100));
        assert_eq!(fan_percentage(-1), None);

        for step in 0..=15_i64 {
            let expected = ((step * 100) as f64 / 15.0 / 10.0).ceil() as u8 * 10;
            assert_eq!(fan_percentage(step), Some(expected), "step {}", step);
        }
    }

    #[test]
    fn test_speed_names() {
        assert_eq!(speed_name(1), "silent");
        assert_eq!(speed_name(2), "standard");
        assert_eq!(speed_name(3), "sport");
        assert_eq!(speed_name(4), "ludicrous");
        assert_eq!(speed_name(0), "standard");
    }

    #[test]
    fn test_stage_description() {
        assert_eq!(stage_description(255), "Idle");
        assert_eq!(stage_description(-1), "Idle");
        assert_eq!(stage_description(0), "Printing");
        assert_eq!(stage_description(35), "Nozzle Clog Pause");
        assert_eq!(stage_description(99), "Unknown");
    }

    #[test]
    fn test_printer_type_detection() {
        assert_eq!(
            printer_type(&[module("esp32", "AP04", "C11")]),
            Some(DeviceType::P1P)
        );
        assert_eq!(
            printer_type(&[module("mc", "AP05-1", "")]),
            Some(DeviceType::X1C)
        );
        assert_eq!(printer_type(&[module("esp32", "AP04", "C12")]), None);
        assert_eq!(printer_type(&[]), None);
    }

    #[test]
    fn test_versions() {
        let modules = vec![
            module("mc", "AP05", ""),
            ModuleReport {
                name: Some("ota".to_string()),
                sw_ver: Some("01.05.01.00".to_string()),
                ..Default::default()
            },
        ];
        assert_eq!(hw_version(&modules).as_deref(), Some("AP05"));
        assert_eq!(sw_version(&modules).as_deref(), Some("01.05.01.00"));
        assert_eq!(sw_version(&modules[..1]), None);
    }

    #[test]
    fn test_wifi_signal() {
        assert_eq!(parse_wifi_signal("-45dBm"), Some(-45));
        assert_eq!(parse_wifi_signal("-60"), Some(-60));
        assert_eq!(parse_wifi_signal("weak"), None);
    }

    #[test]
    fn test_times() {
        assert_eq!(start_time(0), None);
        assert_eq!(
            start_time(1_700_000_000),
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 40).unwrap();
        assert_eq!(
            end_time(90, now),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 31, 0).unwrap())
        );
        assert_eq!(end_time(0, now), None);
    }

    #[test]
    fn test_merge_present() {
        let mut value = 5;
        assert!(!merge_present(&mut value, None));
        assert_eq!(value, 5);
        assert!(merge_present(&mut value, Some(7)));
        assert_eq!(value, 7);
    }
}
