//! Color Control cluster (0x0300) attributes and capability flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::FromRepr;

/// Attribute IDs for the Color Control cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u16)]
pub enum ColorAttribute {
    CurrentHue = 0x0000,
    CurrentSaturation = 0x0001,
    CurrentX = 0x0003,
    CurrentY = 0x0004,
    /// Color temperature in mireds
    ColorTemperature = 0x0007,
    ColorMode = 0x0008,
    /// Added in ZCL revision 5; older devices never define it
    ColorCapabilities = 0x400A,
    ColorTempPhysicalMin = 0x400B,
    ColorTempPhysicalMax = 0x400C,
}

impl ColorAttribute {
    pub const fn name(self) -> &'static str {
        match self {
            ColorAttribute::CurrentHue => "current_hue",
            ColorAttribute::CurrentSaturation => "current_saturation",
            ColorAttribute::CurrentX => "current_x",
            ColorAttribute::CurrentY => "current_y",
            ColorAttribute::ColorTemperature => "color_temperature",
            ColorAttribute::ColorMode => "color_mode",
            ColorAttribute::ColorCapabilities => "color_capabilities",
            ColorAttribute::ColorTempPhysicalMin => "color_temp_physical_min",
            ColorAttribute::ColorTempPhysicalMax => "color_temp_physical_max",
        }
    }
}

bitflags! {
    /// Color capability bitmask as carried by the `color_capabilities` attribute.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ColorCapabilities: u16 {
        const HUE_SATURATION = 0x01;
        const ENHANCED_HUE = 0x02;
        const COLOR_LOOP = 0x04;
        const COLOR_XY = 0x08;
        const COLOR_TEMP = 0x10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_bits() {
        assert_eq!(ColorCapabilities::COLOR_XY.bits(), 0x08);
        assert_eq!(ColorCapabilities::COLOR_TEMP.bits(), 0x10);
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let caps = ColorCapabilities::from_bits_retain(0x8018);
        assert_eq!(caps.bits(), 0x8018);
        assert!(caps.contains(ColorCapabilities::COLOR_XY | ColorCapabilities::COLOR_TEMP));
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(
            ColorAttribute::from_repr(0x400A).map(ColorAttribute::name),
            Some("color_capabilities")
        );
        assert_eq!(ColorAttribute::ColorTemperature.name(), "color_temperature");
    }
}
