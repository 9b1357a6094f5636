//! Zigbee Cluster Library definitions used by the channel layer.
//!
//! Only the pieces the channels need are modelled here: cluster ids, the
//! status codes a read/configure can come back with, typed attribute values
//! and the report-interval presets channels declare their reporting with.

pub mod color;

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

/// Cluster identifiers known to the default channel registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr, Serialize, Deserialize)]
#[repr(u16)]
pub enum ClusterId {
    Basic = 0x0000,
    Identify = 0x0003,
    OnOff = 0x0006,
    LevelControl = 0x0008,
    ColorControl = 0x0300,
    BallastConfiguration = 0x0301,
    TemperatureMeasurement = 0x0402,
    OccupancySensing = 0x0406,
}

impl ClusterId {
    pub fn id(self) -> u16 {
        self as u16
    }
}

/// ZCL status codes carried in read, write and configure-reporting responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Failure = 0x01,
    UnsupportedAttribute = 0x86,
    InvalidValue = 0x87,
    ReadOnly = 0x88,
    UnreportableAttribute = 0x8C,
    InvalidDataType = 0x8D,
}

/// Wire value for "attribute recognised by the protocol but not implemented
/// on this cluster instance".
pub const UNSUPPORTED_ATTRIBUTE: u8 = Status::UnsupportedAttribute as u8;

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// A typed attribute value as decoded by the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Bitmap(u64),
    Enum(u16),
    String(String),
}

impl AttributeValue {
    /// Integer view of the value, for bitmaps and unsigned/enum attributes.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::Unsigned(v) | AttributeValue::Bitmap(v) => Some(*v),
            AttributeValue::Enum(v) => Some(u64::from(*v)),
            AttributeValue::Bool(v) => Some(u64::from(*v)),
            AttributeValue::Signed(v) => u64::try_from(*v).ok(),
            AttributeValue::String(_) => None,
        }
    }
}

/// Named reporting presets a channel declares its report configuration with.
///
/// The concrete intervals come from [`crate::config::ReportingConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ReportPreset {
    Default,
    Asap,
    Immediate,
    BatterySave,
}
