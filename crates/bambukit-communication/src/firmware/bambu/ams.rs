//! AMS material registry
//!
//! Tracks the Automatic Material System units attached to a printer. Unit
//! identity (serial and versions) comes from `ams/<n>` entries of the
//! module list; live values (humidity, temperature, trays) come from the
//! `ams` group of the print report. The two streams are independent and
//! can arrive in any order:
//!
//! - module entries decide which units exist;
//! - live values for a unit that is not known yet are held back and
//!   attached when its identity arrives;
//! - units and trays are keyed by their declared index, never by their
//!   position in a list, so replaying a fragment is idempotent.

use super::report::{AmsReport, AmsUnitReport, Fragment, ModuleReport, TrayReport};
use super::utils::{float_field, int_field, merge_present};
use serde::Serialize;
use std::collections::BTreeMap;

/// Module name prefix for AMS units
pub const AMS_MODULE_PREFIX: &str = "ams/";

/// Trays per AMS unit
pub const TRAYS_PER_UNIT: u8 = 4;

/// `tray_now` value meaning no tray is loaded
pub const NO_TRAY: i64 = 255;

/// `tray_now` value for the external spool holder
pub const EXTERNAL_TRAY: u8 = 254;

fn merge_option<T>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    merge_present(slot, incoming.map(Some))
}

/// One filament tray
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tray {
    /// Material type
    pub tray_type: Option<String>,
    /// RGBA hex colour
    pub color: Option<String>,
    /// Sub-brand
    pub sub_brand: Option<String>,
    /// Remaining filament percentage
    pub remaining: Option<i64>,
    /// Minimum nozzle temperature
    pub nozzle_temp_min: Option<i64>,
    /// Maximum nozzle temperature
    pub nozzle_temp_max: Option<i64>,
    /// Bed temperature
    pub bed_temp: Option<i64>,
    /// Spool UUID
    pub uuid: Option<String>,
    /// RFID tag UID
    pub tag_uid: Option<String>,
}

impl Tray {
    fn update(&mut self, report: &TrayReport) {
        merge_option(&mut self.tray_type, report.tray_type.clone());
        merge_option(&mut self.color, report.tray_color.clone());
        merge_option(&mut self.sub_brand, report.tray_sub_brands.clone());
        merge_option(
            &mut self.remaining,
            int_field(report.remain.as_ref(), "remain", -1..=100),
        );
        merge_option(
            &mut self.nozzle_temp_min,
            int_field(report.nozzle_temp_min.as_ref(), "nozzle_temp_min", ..),
        );
        merge_option(
            &mut self.nozzle_temp_max,
            int_field(report.nozzle_temp_max.as_ref(), "nozzle_temp_max", ..),
        );
        merge_option(
            &mut self.bed_temp,
            int_field(report.bed_temp.as_ref(), "bed_temp", ..),
        );
        merge_option(&mut self.uuid, report.tray_uuid.clone());
        merge_option(&mut self.tag_uid, report.tag_uid.clone());
    }
}

/// Live values of one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AmsLive {
    humidity: Option<i64>,
    temperature: Option<f64>,
    trays: BTreeMap<u8, Tray>,
}

impl AmsLive {
    fn update(&mut self, report: &AmsUnitReport) {
        merge_option(
            &mut self.humidity,
            int_field(report.humidity.as_ref(), "humidity", 0..=100),
        );
        merge_option(
            &mut self.temperature,
            float_field(report.temp.as_ref(), "temp"),
        );

        for tray in report.tray.as_deref().unwrap_or_default() {
            let Some(id) = int_field(tray.id.as_ref(), "tray id", 0..i64::from(TRAYS_PER_UNIT))
            else {
                continue;
            };
            self.trays.entry(id as u8).or_default().update(tray);
        }
    }

    /// Humidity level
    pub fn humidity(&self) -> Option<i64> {
        self.humidity
    }

    /// Temperature in Celsius
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Tray by declared index
    pub fn tray(&self, id: u8) -> Option<&Tray> {
        self.trays.get(&id)
    }

    /// Trays in index order
    pub fn trays(&self) -> impl Iterator<Item = (u8, &Tray)> {
        self.trays.iter().map(|(id, tray)| (*id, tray))
    }
}

/// One known AMS unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmsUnit {
    index: u8,
    serial: Option<String>,
    sw_version: Option<String>,
    hw_version: Option<String>,
    live: Option<AmsLive>,
}

impl AmsUnit {
    fn new(index: u8) -> Self {
        Self {
            index,
            serial: None,
            sw_version: None,
            hw_version: None,
            live: None,
        }
    }

    fn update_identity(&mut self, module: &ModuleReport) {
        merge_option(&mut self.serial, module.sn.clone());
        merge_option(&mut self.sw_version, module.sw_ver.clone());
        merge_option(&mut self.hw_version, module.hw_ver.clone());
    }

    /// Unit index
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Unit serial
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Unit firmware version
    pub fn sw_version(&self) -> Option<&str> {
        self.sw_version.as_deref()
    }

    /// Unit hardware version
    pub fn hw_version(&self) -> Option<&str> {
        self.hw_version.as_deref()
    }

    /// Live values, once any have arrived
    pub fn live(&self) -> Option<&AmsLive> {
        self.live.as_ref()
    }
}

/// Lifecycle of a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmsUnitState {
    /// No identity received
    Absent,
    /// Identity received, no live values yet
    Known,
    /// Identity and live values received
    Populated,
}

/// Registry of AMS units keyed by index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmsRegistry {
    units: BTreeMap<u8, AmsUnit>,
    pending: BTreeMap<u8, AmsLive>,
    active_tray: Option<u8>,
}

impl AmsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fragment
    ///
    /// Returns the indices that became known for the first time, in order.
    pub fn update(&mut self, fragment: &Fragment) -> Vec<u8> {
        let mut discovered = Vec::new();

        for module in fragment.modules() {
            let Some(index) = module_index(module) else {
                continue;
            };
            if self.apply_identity(index, module) {
                discovered.push(index);
            }
        }

        if let Some(report) = fragment.ams.as_ref() {
            self.apply_live(report);
        }

        discovered
    }

    fn apply_identity(&mut self, index: u8, module: &ModuleReport) -> bool {
        if let Some(unit) = self.units.get_mut(&index) {
            unit.update_identity(module);
            return false;
        }

        let mut unit = AmsUnit::new(index);
        unit.update_identity(module);
        unit.live = self.pending.remove(&index);
        tracing::debug!(
            "AMS {} discovered: {}",
            index,
            unit.serial().unwrap_or("no serial")
        );
        self.units.insert(index, unit);
        true
    }

    fn apply_live(&mut self, report: &AmsReport) {
        if let Some(tray_now) = int_field(report.tray_now.as_ref(), "tray_now", 0..=NO_TRAY) {
            self.active_tray = (tray_now != NO_TRAY).then_some(tray_now as u8);
        }

        for unit_report in report.ams.as_deref().unwrap_or_default() {
            let Some(index) = int_field(unit_report.id.as_ref(), "ams id", 0..=i64::from(u8::MAX))
            else {
                continue;
            };
            let index = index as u8;
            match self.units.get_mut(&index) {
                Some(unit) => unit.live.get_or_insert_with(AmsLive::default).update(unit_report),
                None => {
                    tracing::trace!("Holding live values for unidentified AMS {}", index);
                    self.pending.entry(index).or_default().update(unit_report);
                }
            }
        }
    }

    /// State of the slot at `index`
    pub fn state(&self, index: u8) -> AmsUnitState {
        match self.units.get(&index) {
            None => AmsUnitState::Absent,
            Some(unit) if unit.live.is_none() => AmsUnitState::Known,
            Some(_) => AmsUnitState::Populated,
        }
    }

    /// Known unit at `index`
    pub fn unit(&self, index: u8) -> Option<&AmsUnit> {
        self.units.get(&index)
    }

    /// Known units in index order
    pub fn units(&self) -> impl Iterator<Item = &AmsUnit> {
        self.units.values()
    }

    /// Number of known units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check whether no unit is known
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Check whether live values are held for an unidentified unit
    pub fn has_pending(&self, index: u8) -> bool {
        self.pending.contains_key(&index)
    }

    /// Global index of the loaded tray
    pub fn active_tray(&self) -> Option<u8> {
        self.active_tray
    }

    /// Check whether filament is fed from the external spool
    pub fn is_external_spool(&self) -> bool {
        self.active_tray == Some(EXTERNAL_TRAY)
    }

    /// Loaded tray as `(unit, tray)`
    ///
    /// `None` when nothing is loaded, when the external spool is in use,
    /// or when the tray belongs to a unit that is not known.
    pub fn active_slot(&self) -> Option<(u8, u8)> {
        let tray = self.active_tray.filter(|&tray| tray != EXTERNAL_TRAY)?;
        let unit = tray / TRAYS_PER_UNIT;
        self.units
            .contains_key(&unit)
            .then_some((unit, tray % TRAYS_PER_UNIT))
    }

    /// Display values
    pub fn snapshot(&self) -> AmsSnapshot {
        AmsSnapshot {
            units: self.units.values().cloned().collect(),
            active_tray: self.active_tray,
        }
    }
}

/// Registry contents for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmsSnapshot {
    /// Known units in index order
    pub units: Vec<AmsUnit>,
    /// Global index of the loaded tray
    pub active_tray: Option<u8>,
}

/// Parse the unit index of an `ams/<n>` module
fn module_index(module: &ModuleReport) -> Option<u8> {
    let name = module.name.as_deref()?;
    let suffix = name.strip_prefix(AMS_MODULE_PREFIX)?;
    match suffix.parse::<u8>() {
        Ok(index) => Some(index),
        Err(_) => {
            tracing::debug!("Ignoring AMS module with bad index: {}", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(value: serde_json::Value) -> Fragment {
        Fragment::from_value(value).unwrap()
    }

    #[test]
    fn test_module_index() {
        let module = |name: &str| ModuleReport {
            name: Some(name.to_string()),
            ..Default::default()
        };
        assert_eq!(module_index(&module("ams/0")), Some(0));
        assert_eq!(module_index(&module("ams/12")), Some(12));
        assert_eq!(module_index(&module("ams/x")), None);
        assert_eq!(module_index(&module("mc")), None);
    }

    #[test]
    fn test_trays_keyed_by_declared_id() {
        let mut registry = AmsRegistry::new();
        registry.update(&fragment(json!({"module": [{"name": "ams/0", "sn": "A"}]})));
        registry.update(&fragment(json!({
            "ams": {"ams": [{"id": "0", "tray": [
                {"id": "3", "tray_type": "PETG"},
                {"id": "1", "tray_type": "PLA", "remain": 80}
            ]}]}
        })));

        let live = registry.unit(0).unwrap().live().unwrap();
        assert_eq!(live.tray(3).unwrap().tray_type.as_deref(), Some("PETG"));
        assert_eq!(live.tray(1).unwrap().remaining, Some(80));
        assert!(live.tray(0).is_none());
    }

    #[test]
    fn test_active_tray() {
        let mut registry = AmsRegistry::new();
        registry.update(&fragment(json!({"ams": {"tray_now": "6"}})));
        assert_eq!(registry.active_tray(), Some(6));
        // Unit 1 is not known yet
        assert_eq!(registry.active_slot(), None);

        registry.update(&fragment(json!({"module": [{"name": "ams/1", "sn": "B"}]})));
        assert_eq!(registry.active_slot(), Some((1, 2)));

        registry.update(&fragment(json!({"ams": {"tray_now": "255"}})));
        assert_eq!(registry.active_tray(), None);
        assert_eq!(registry.active_slot(), None);
    }

    #[test]
    fn test_external_spool_has_no_slot() {
        let mut registry = AmsRegistry::new();
        registry.update(&fragment(json!({"module": [{"name": "ams/0", "sn": "A"}]})));
        registry.update(&fragment(json!({"ams": {"tray_now": "254"}})));

        assert_eq!(registry.active_tray(), Some(EXTERNAL_TRAY));
        assert!(registry.is_external_spool());
        assert_eq!(registry.active_slot(), None);

        registry.update(&fragment(json!({"ams": {"tray_now": "1"}})));
        assert!(!registry.is_external_spool());
        assert_eq!(registry.active_slot(), Some((0, 1)));
    }
}
