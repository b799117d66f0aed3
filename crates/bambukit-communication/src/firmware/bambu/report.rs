//! Bambu Report Parsing
//!
//! Typed view of the JSON documents the printer publishes on its report
//! topic. A document is an envelope with optional `print` (live telemetry)
//! and `info` (module list returned by `get_version`) groups; each group is
//! decoded into a [`Fragment`].
//!
//! Every field is optional and decoded leniently: a value of the wrong
//! shape is treated as absent instead of rejecting the whole fragment, so a
//! single bad field never blocks the fields around it.

use bambukit_core::ModelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A telemetry scalar as the firmware sends it
///
/// The firmware is inconsistent about number encoding: the same field may
/// be `"4"`, `4` or `4.0` depending on model and firmware version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String, possibly holding a number
    Text(String),
}

impl Scalar {
    /// Coerce to a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) if f.is_finite() => Some(*f),
            Scalar::Float(_) => None,
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        }
    }

    /// Coerce to an integer
    ///
    /// Floats are accepted only when they carry no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        if let Scalar::Int(i) = self {
            return Some(*i);
        }
        if let Some(i) = self.as_str().and_then(|s| s.trim().parse::<i64>().ok()) {
            return Some(i);
        }
        let f = self.as_f64()?;
        (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
    }

    /// Borrow the text form, if this scalar was sent as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Decode a field, mapping any shape mismatch to `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(T::deserialize(value).ok())
}

/// Decode a list, dropping elements that do not match
///
/// A non-list value decodes to `None`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| T::deserialize(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

/// One entry of the `module` list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModuleReport {
    /// Module name, e.g. `mc`, `ota`, `esp32` or `ams/0`
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    /// Project code, used to tell printer families apart
    #[serde(deserialize_with = "lenient")]
    pub project_name: Option<String>,
    /// Software version
    #[serde(deserialize_with = "lenient")]
    pub sw_ver: Option<String>,
    /// Hardware version
    #[serde(deserialize_with = "lenient")]
    pub hw_ver: Option<String>,
    /// Module serial number
    #[serde(deserialize_with = "lenient")]
    pub sn: Option<String>,
}

impl ModuleReport {
    /// Check whether this module has the given name
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

/// One entry of the `lights_report` list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightReport {
    /// LED node, `chamber_light` or `work_light`
    #[serde(deserialize_with = "lenient")]
    pub node: Option<String>,
    /// Mode string
    #[serde(deserialize_with = "lenient")]
    pub mode: Option<String>,
}

/// One tray inside an AMS unit
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrayReport {
    /// Tray index within its unit (0-3)
    #[serde(deserialize_with = "lenient")]
    pub id: Option<Scalar>,
    /// Material type, e.g. `PLA`
    #[serde(deserialize_with = "lenient")]
    pub tray_type: Option<String>,
    /// RGBA hex colour
    #[serde(deserialize_with = "lenient")]
    pub tray_color: Option<String>,
    /// Material sub-brand
    #[serde(deserialize_with = "lenient")]
    pub tray_sub_brands: Option<String>,
    /// Remaining filament percentage, -1 when unknown
    #[serde(deserialize_with = "lenient")]
    pub remain: Option<Scalar>,
    /// Minimum nozzle temperature
    #[serde(deserialize_with = "lenient")]
    pub nozzle_temp_min: Option<Scalar>,
    /// Maximum nozzle temperature
    #[serde(deserialize_with = "lenient")]
    pub nozzle_temp_max: Option<Scalar>,
    /// Bed temperature
    #[serde(deserialize_with = "lenient")]
    pub bed_temp: Option<Scalar>,
    /// Spool UUID
    #[serde(deserialize_with = "lenient")]
    pub tray_uuid: Option<String>,
    /// RFID tag UID
    #[serde(deserialize_with = "lenient")]
    pub tag_uid: Option<String>,
}

/// One AMS unit inside the `ams` group
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AmsUnitReport {
    /// Unit index
    #[serde(deserialize_with = "lenient")]
    pub id: Option<Scalar>,
    /// Humidity level (1-5)
    #[serde(deserialize_with = "lenient")]
    pub humidity: Option<Scalar>,
    /// Temperature in Celsius
    #[serde(deserialize_with = "lenient")]
    pub temp: Option<Scalar>,
    /// Trays, keyed by their own `id`
    #[serde(deserialize_with = "lenient_list")]
    pub tray: Option<Vec<TrayReport>>,
}

/// The `ams` group of a live report
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AmsReport {
    /// Per-unit live values
    #[serde(deserialize_with = "lenient_list")]
    pub ams: Option<Vec<AmsUnitReport>>,
    /// Global index of the loaded tray, 255 when none
    #[serde(deserialize_with = "lenient")]
    pub tray_now: Option<Scalar>,
}

/// One telemetry fragment
///
/// A field is absent exactly when it is `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Fragment {
    /// Bed temperature
    #[serde(deserialize_with = "lenient")]
    pub bed_temper: Option<Scalar>,
    /// Bed target temperature
    #[serde(deserialize_with = "lenient")]
    pub bed_target_temper: Option<Scalar>,
    /// Chamber temperature
    #[serde(deserialize_with = "lenient")]
    pub chamber_temper: Option<Scalar>,
    /// Nozzle temperature
    #[serde(deserialize_with = "lenient")]
    pub nozzle_temper: Option<Scalar>,
    /// Nozzle target temperature
    #[serde(deserialize_with = "lenient")]
    pub nozzle_target_temper: Option<Scalar>,

    /// Auxiliary fan step
    #[serde(deserialize_with = "lenient")]
    pub big_fan1_speed: Option<Scalar>,
    /// Chamber fan step
    #[serde(deserialize_with = "lenient")]
    pub big_fan2_speed: Option<Scalar>,
    /// Part cooling fan step
    #[serde(deserialize_with = "lenient")]
    pub cooling_fan_speed: Option<Scalar>,
    /// Heatbreak fan step
    #[serde(deserialize_with = "lenient")]
    pub heatbreak_fan_speed: Option<Scalar>,

    /// LED states
    #[serde(deserialize_with = "lenient_list")]
    pub lights_report: Option<Vec<LightReport>>,

    /// Wi-Fi signal, e.g. `-45dBm`
    #[serde(deserialize_with = "lenient")]
    pub wifi_signal: Option<Scalar>,
    /// Print progress percentage
    #[serde(deserialize_with = "lenient")]
    pub mc_percent: Option<Scalar>,
    /// Job phase
    #[serde(deserialize_with = "lenient")]
    pub gcode_state: Option<String>,
    /// Remaining minutes
    #[serde(deserialize_with = "lenient")]
    pub mc_remaining_time: Option<Scalar>,
    /// Job start, unix seconds
    #[serde(deserialize_with = "lenient")]
    pub gcode_start_time: Option<Scalar>,
    /// Current layer
    #[serde(deserialize_with = "lenient")]
    pub layer_num: Option<Scalar>,
    /// Total layers
    #[serde(deserialize_with = "lenient")]
    pub total_layer_num: Option<Scalar>,

    /// Speed profile level
    #[serde(deserialize_with = "lenient")]
    pub spd_lvl: Option<Scalar>,
    /// Speed percentage
    #[serde(deserialize_with = "lenient")]
    pub spd_mag: Option<Scalar>,
    /// Current stage id
    #[serde(deserialize_with = "lenient")]
    pub stg_cur: Option<Scalar>,

    /// Module descriptors (identity stream)
    #[serde(deserialize_with = "lenient_list")]
    pub module: Option<Vec<ModuleReport>>,
    /// AMS live values
    #[serde(deserialize_with = "lenient")]
    pub ams: Option<AmsReport>,
}

impl Fragment {
    /// Decode a fragment from an already-parsed JSON object
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        if !value.is_object() {
            return Err(ModelError::NotAnObject {
                kind: json_kind(&value).to_string(),
            });
        }
        Fragment::deserialize(value).map_err(|e| ModelError::InvalidPayload {
            reason: e.to_string(),
        })
    }

    /// Module list, empty when the fragment carries none
    pub fn modules(&self) -> &[ModuleReport] {
        self.module.as_deref().unwrap_or_default()
    }

    /// Find the module descriptor with the given name
    pub fn module_named(&self, name: &str) -> Option<&ModuleReport> {
        self.modules().iter().find(|m| m.is_named(name))
    }

    /// Find the lights entry for the given node
    pub fn light(&self, node: &str) -> Option<&LightReport> {
        self.lights_report
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|l| l.node.as_deref() == Some(node))
    }
}

/// A raw report document as received from the report topic
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Report {
    /// Live telemetry group
    #[serde(deserialize_with = "lenient")]
    pub print: Option<Fragment>,
    /// Identity group (reply to `get_version`)
    #[serde(deserialize_with = "lenient")]
    pub info: Option<Fragment>,
}

impl Report {
    /// Parse a raw payload
    ///
    /// Fails only when the payload is not a JSON object. Unknown groups and
    /// malformed fields inside known groups are not errors.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ModelError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| ModelError::InvalidPayload {
                reason: e.to_string(),
            })?;
        if !value.is_object() {
            return Err(ModelError::NotAnObject {
                kind: json_kind(&value).to_string(),
            });
        }
        Report::deserialize(value).map_err(|e| ModelError::InvalidPayload {
            reason: e.to_string(),
        })
    }

    /// Fragments carried by this report, identity first
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.info.iter().chain(self.print.iter())
    }

    /// Check whether the report carries any fragment
    pub fn is_empty(&self) -> bool {
        self.print.is_none() && self.info.is_none()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
