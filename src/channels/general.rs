//! Declarative channels for clusters without custom lifecycle logic.

use super::ChannelHooks;
use crate::zcl::ReportPreset;
use async_trait::async_trait;

/// A channel whose behaviour is fully described by what it reports and
/// which attributes it caches at initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenericChannel {
    name: &'static str,
    report_config: &'static [(&'static str, ReportPreset)],
    init_attributes: &'static [&'static str],
}

impl GenericChannel {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            report_config: &[],
            init_attributes: &[],
        }
    }

    pub const fn reporting(
        mut self,
        report_config: &'static [(&'static str, ReportPreset)],
    ) -> Self {
        self.report_config = report_config;
        self
    }

    pub const fn caching(mut self, init_attributes: &'static [&'static str]) -> Self {
        self.init_attributes = init_attributes;
        self
    }
}

/// Fallback for server clusters the registry has no entry for.
pub const GENERIC: GenericChannel = GenericChannel::new("generic");

pub const BASIC: GenericChannel =
    GenericChannel::new("basic").caching(&["manufacturer", "model", "power_source"]);

pub const IDENTIFY: GenericChannel = GenericChannel::new("identify");

pub const ON_OFF: GenericChannel = GenericChannel::new("on_off")
    .reporting(&[("on_off", ReportPreset::Immediate)])
    .caching(&["on_off"]);

pub const ON_OFF_CLIENT: GenericChannel = GenericChannel::new("on_off_client");

pub const LEVEL: GenericChannel = GenericChannel::new("level")
    .reporting(&[("current_level", ReportPreset::Asap)])
    .caching(&["current_level"]);

pub const TEMPERATURE: GenericChannel = GenericChannel::new("temperature")
    .reporting(&[("measured_value", ReportPreset::Default)])
    .caching(&["measured_value"]);

pub const OCCUPANCY: GenericChannel = GenericChannel::new("occupancy")
    .reporting(&[("occupancy", ReportPreset::Immediate)])
    .caching(&["occupancy"]);

#[async_trait]
impl ChannelHooks for GenericChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn report_config(&self) -> &'static [(&'static str, ReportPreset)] {
        self.report_config
    }

    fn init_attributes(&self) -> &'static [&'static str] {
        self.init_attributes
    }
}
