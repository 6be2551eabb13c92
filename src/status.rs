use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    color::{DeviceHsv, DEVICE_HUE_MAX, DEVICE_SCALE_MAX},
    error::{Error, Result},
};

pub mod codes {
    pub const SWITCH_LED: &str = "switch_led";
    pub const BRIGHT_VALUE: &str = "bright_value";
    pub const BRIGHT_VALUE_V2: &str = "bright_value_v2";
    pub const COLOUR_DATA: &str = "colour_data";
    pub const COLOUR_DATA_V2: &str = "colour_data_v2";
    pub const WORK_MODE: &str = "work_mode";
    pub const TEMP_VALUE: &str = "temp_value";
    pub const COUNTDOWN: &str = "countdown";
    pub const CONTROL_DATA: &str = "control_data";
    pub const MUSIC_DATA: &str = "music_data";
    pub const SCENE_DATA: &str = "scene_data";
    pub const RHYTHM_MODE: &str = "rhythm_mode";
    pub const POWER_MEMORY: &str = "power_memory";
}

pub const WORK_MODE_COLOUR: &str = "colour";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Bool(bool),
    Integer(i64),
    Colour(DeviceHsv),
    Text(String),
    Other(serde_json::Value),
}

impl StatusValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatusValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            StatusValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatusValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Colour object, also accepted when the vendor sends it JSON encoded.
    pub fn as_colour(&self) -> Option<DeviceHsv> {
        match self {
            StatusValue::Colour(c) => Some(*c),
            StatusValue::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }
}

impl From<bool> for StatusValue {
    fn from(value: bool) -> Self {
        StatusValue::Bool(value)
    }
}

impl From<i64> for StatusValue {
    fn from(value: i64) -> Self {
        StatusValue::Integer(value)
    }
}

impl From<DeviceHsv> for StatusValue {
    fn from(value: DeviceHsv) -> Self {
        StatusValue::Colour(value)
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        StatusValue::Text(value.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        StatusValue::Text(value)
    }
}

/// A typed control point, e.g. `{"code": "switch_led", "value": true}`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StatusEntry {
    pub code: String,
    pub value: StatusValue,
}

impl StatusEntry {
    pub fn new(code: &str, value: impl Into<StatusValue>) -> Self {
        Self {
            code: code.to_string(),
            value: value.into(),
        }
    }
}

pub fn find_status<'a>(status: &'a [StatusEntry], code: &str) -> Option<&'a StatusValue> {
    status.iter().find(|s| s.code == code).map(|s| &s.value)
}

/// Replaces the entry with the same code, or appends it if there is none.
pub fn upsert_status(status: &mut Vec<StatusEntry>, entry: StatusEntry) {
    match status.iter_mut().find(|s| s.code == entry.code) {
        Some(existing) => *existing = entry,
        None => status.push(entry),
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "RangeFields")]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
    pub scale: u32,
    pub step: i64,
    pub unit: Option<String>,
}

#[derive(Deserialize)]
struct RangeFields {
    min: i64,
    max: i64,
    #[serde(default)]
    scale: u32,
    #[serde(default = "default_step")]
    step: i64,
    #[serde(default)]
    unit: Option<String>,
}

fn default_step() -> i64 {
    1
}

impl TryFrom<RangeFields> for ValueRange {
    type Error = String;

    fn try_from(fields: RangeFields) -> std::result::Result<Self, Self::Error> {
        if fields.min > fields.max {
            return Err(format!("inverted range {}..={}", fields.min, fields.max));
        }

        Ok(ValueRange {
            min: fields.min,
            max: fields.max,
            scale: fields.scale,
            step: fields.step,
            unit: fields.unit,
        })
    }
}

impl ValueRange {
    pub fn new(min: i64, max: i64, step: i64) -> Self {
        Self {
            min,
            max,
            scale: 0,
            step,
            unit: None,
        }
    }

    /// Never panics, even on an inverted range built by hand; the upper bound
    /// wins then.
    pub fn clamp(&self, value: i64) -> i64 {
        value.max(self.min).min(self.max)
    }

    fn check_order(&self, code: &str) -> Result<()> {
        if self.min > self.max {
            return Err(Error::invalid_value(
                code,
                format!("inverted range {}..={}", self.min, self.max),
            ));
        }
        Ok(())
    }

    fn check(&self, code: &str, value: i64) -> Result<()> {
        if value < self.min || value > self.max {
            return Err(Error::invalid_value(
                code,
                format!("{value} outside {}..={}", self.min, self.max),
            ));
        }

        if self.step > 1 && (value - self.min) % self.step != 0 {
            return Err(Error::invalid_value(
                code,
                format!("{value} is not a multiple of step {}", self.step),
            ));
        }

        Ok(())
    }
}

/// Declared shape of a status code, as found in the vendor's `type_desc`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypeDescriptor {
    Bool,
    Value(ValueRange),
    String { maxlen: usize },
    Enum { range: Vec<String> },
    Raw { maxlen: usize },
    Json { h: ValueRange, s: ValueRange, v: ValueRange },
}

impl TypeDescriptor {
    fn device_hsv() -> Self {
        let hue = ValueRange::new(0, i64::from(DEVICE_HUE_MAX), 1);
        let scale = ValueRange::new(0, i64::from(DEVICE_SCALE_MAX), 1);
        TypeDescriptor::Json {
            h: hue,
            s: scale.clone(),
            v: scale,
        }
    }

    pub fn validate(&self, code: &str, value: &StatusValue) -> Result<()> {
        match (self, value) {
            (TypeDescriptor::Bool, StatusValue::Bool(_)) => Ok(()),
            (TypeDescriptor::Value(range), StatusValue::Integer(i)) => range.check(code, *i),
            (TypeDescriptor::String { maxlen }, StatusValue::Text(s))
            | (TypeDescriptor::Raw { maxlen }, StatusValue::Text(s)) => {
                if s.len() > *maxlen {
                    Err(Error::invalid_value(
                        code,
                        format!("length {} exceeds {maxlen}", s.len()),
                    ))
                } else {
                    Ok(())
                }
            }
            (TypeDescriptor::Enum { range }, StatusValue::Text(s)) => {
                if range.iter().any(|r| r == s) {
                    Ok(())
                } else {
                    Err(Error::invalid_value(
                        code,
                        format!("{s:?} not one of {range:?}"),
                    ))
                }
            }
            (TypeDescriptor::Json { h, s, v }, StatusValue::Colour(c)) => {
                h.check(code, i64::from(c.h))?;
                s.check(code, i64::from(c.s))?;
                v.check(code, i64::from(c.v))
            }
            (descriptor, value) => Err(Error::invalid_value(
                code,
                format!("{value:?} does not match {}", descriptor.type_name()),
            )),
        }
    }

    /// Rejects value ranges whose lower bound exceeds the upper one.
    pub fn check_ranges(&self, code: &str) -> Result<()> {
        match self {
            TypeDescriptor::Value(range) => range.check_order(code),
            TypeDescriptor::Json { h, s, v } => {
                h.check_order(code)?;
                s.check_order(code)?;
                v.check_order(code)
            }
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TypeDescriptor::Bool => "bool",
            TypeDescriptor::Value(_) => "value",
            TypeDescriptor::String { .. } => "string",
            TypeDescriptor::Enum { .. } => "enum",
            TypeDescriptor::Raw { .. } => "raw",
            TypeDescriptor::Json { .. } => "json",
        }
    }
}

/// Known type descriptors for device commands and group properties.
#[derive(Clone, Debug)]
pub struct Schema {
    device: HashMap<String, TypeDescriptor>,
    group: HashMap<String, TypeDescriptor>,
}

impl Default for Schema {
    fn default() -> Self {
        let brightness = ValueRange::new(10, 1000, 1);
        let text = |maxlen| TypeDescriptor::String { maxlen };
        let raw = |maxlen| TypeDescriptor::Raw { maxlen };

        let device = [
            (codes::SWITCH_LED, TypeDescriptor::Bool),
            (codes::BRIGHT_VALUE_V2, TypeDescriptor::Value(brightness.clone())),
            (codes::COLOUR_DATA_V2, TypeDescriptor::device_hsv()),
        ];

        let group = [
            (codes::SWITCH_LED, TypeDescriptor::Bool),
            (codes::BRIGHT_VALUE, TypeDescriptor::Value(brightness)),
            (codes::COLOUR_DATA, text(255)),
            (
                codes::WORK_MODE,
                TypeDescriptor::Enum {
                    range: ["white", "colour", "scene", "music"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                },
            ),
            (
                codes::TEMP_VALUE,
                TypeDescriptor::Value(ValueRange::new(0, 1000, 1)),
            ),
            (
                codes::COUNTDOWN,
                TypeDescriptor::Value(ValueRange {
                    unit: Some("s".to_string()),
                    ..ValueRange::new(0, 86400, 1)
                }),
            ),
            (codes::CONTROL_DATA, text(255)),
            (codes::MUSIC_DATA, text(255)),
            (codes::SCENE_DATA, text(255)),
            (codes::RHYTHM_MODE, raw(255)),
            (codes::POWER_MEMORY, raw(255)),
        ];

        let to_map = |entries: &[(&str, TypeDescriptor)]| {
            entries
                .iter()
                .map(|(code, desc)| (code.to_string(), desc.clone()))
                .collect()
        };

        Schema {
            device: to_map(&device),
            group: to_map(&group),
        }
    }
}

impl Schema {
    pub fn device(&self, code: &str) -> Option<&TypeDescriptor> {
        self.device.get(code)
    }

    pub fn group(&self, code: &str) -> Option<&TypeDescriptor> {
        self.group.get(code)
    }

    /// Registers or replaces a group property descriptor, e.g. one parsed
    /// from a vendor `type_desc` string.
    pub fn insert_group(&mut self, code: &str, descriptor: TypeDescriptor) -> Result<()> {
        descriptor.check_ranges(code)?;
        self.group.insert(code.to_string(), descriptor);
        Ok(())
    }

    pub fn validate_device(&self, entry: &StatusEntry) -> Result<()> {
        let descriptor = self
            .device(&entry.code)
            .ok_or_else(|| Error::invalid_value(&entry.code, "unknown device command"))?;
        descriptor.validate(&entry.code, &entry.value)
    }

    pub fn validate_group(&self, entry: &StatusEntry) -> Result<()> {
        let descriptor = self
            .group(&entry.code)
            .ok_or_else(|| Error::invalid_value(&entry.code, "unknown group property"))?;
        descriptor.validate(&entry.code, &entry.value)
    }
}
