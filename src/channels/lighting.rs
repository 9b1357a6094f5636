//! Lighting channels.
//!
//! The color channel negotiates which color modes a light supports before
//! its reporting is configured, so lights that cannot do color temperature
//! (or XY) never get subscriptions for attributes they do not drive.

use super::general::GenericChannel;
use super::{AttributeAccessor, AttributeReadResult, ChannelHooks, ReportSpec};
use crate::error::Result;
use crate::zcl::ReportPreset;
use crate::zcl::color::{ColorAttribute, ColorCapabilities};
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;

pub const BALLAST: GenericChannel = GenericChannel::new("ballast");

pub const COLOR_CLIENT: GenericChannel = GenericChannel::new("color_client");

const CURRENT_X: &str = ColorAttribute::CurrentX.name();
const CURRENT_Y: &str = ColorAttribute::CurrentY.name();
const COLOR_TEMPERATURE: &str = ColorAttribute::ColorTemperature.name();
const COLOR_CAPABILITIES: &str = ColorAttribute::ColorCapabilities.name();

/// Color Control channel with capability negotiation.
#[derive(Debug, Default)]
pub struct ColorChannel {
    capabilities: RwLock<Option<ColorCapabilities>>,
}

impl ColorChannel {
    const REPORT_CONFIG: &'static [(&'static str, ReportPreset)] = &[
        (CURRENT_X, ReportPreset::Default),
        (CURRENT_Y, ReportPreset::Default),
        (COLOR_TEMPERATURE, ReportPreset::Default),
    ];

    const INIT_ATTRIBUTES: &'static [&'static str] =
        &[COLOR_TEMPERATURE, CURRENT_X, CURRENT_Y];

    pub fn new() -> Self {
        Self::default()
    }

    /// Determine the light's color capabilities and store them.
    ///
    /// A concrete `color_capabilities` value is authoritative. Devices that
    /// predate the attribute (ZCL revision 4) must support XY, and support
    /// color temperature if `color_temperature` reads back a value.
    pub async fn fetch_color_capabilities(
        &self,
        attrs: &AttributeAccessor,
        from_cache: bool,
    ) -> Result<ColorCapabilities> {
        let reported = attrs
            .get_attribute_value(COLOR_CAPABILITIES, from_cache)
            .await?;

        let capabilities = match Self::descriptor(&reported) {
            Some(capabilities) => capabilities,
            None => {
                debug!(
                    "color_capabilities is {:?}, probing color_temperature",
                    reported
                );
                let mut capabilities = ColorCapabilities::COLOR_XY;
                let color_temp = attrs
                    .get_attribute_value(COLOR_TEMPERATURE, from_cache)
                    .await?;
                if color_temp.is_value() {
                    capabilities |= ColorCapabilities::COLOR_TEMP;
                }
                capabilities
            }
        };

        *self.capabilities.write() = Some(capabilities);
        Ok(capabilities)
    }

    fn descriptor(result: &AttributeReadResult) -> Option<ColorCapabilities> {
        let value = result.value()?;
        match value.as_u64().map(u16::try_from) {
            Some(Ok(bits)) => Some(ColorCapabilities::from_bits_retain(bits)),
            _ => {
                warn!("Ignoring malformed color_capabilities value {:?}", value);
                None
            }
        }
    }
}

#[async_trait]
impl ChannelHooks for ColorChannel {
    fn name(&self) -> &'static str {
        "color"
    }

    fn report_config(&self) -> &'static [(&'static str, ReportPreset)] {
        Self::REPORT_CONFIG
    }

    fn init_attributes(&self) -> &'static [&'static str] {
        Self::INIT_ATTRIBUTES
    }

    fn should_report(&self, spec: &ReportSpec) -> bool {
        let Some(capabilities) = *self.capabilities.read() else {
            return true;
        };
        match spec.attribute {
            COLOR_TEMPERATURE => capabilities.contains(ColorCapabilities::COLOR_TEMP),
            CURRENT_X | CURRENT_Y => capabilities.contains(ColorCapabilities::COLOR_XY),
            _ => true,
        }
    }

    async fn pre_configure(&self, attrs: &AttributeAccessor) -> Result<()> {
        self.fetch_color_capabilities(attrs, false).await?;
        Ok(())
    }

    async fn pre_initialize(&self, attrs: &AttributeAccessor, from_cache: bool) -> Result<()> {
        self.fetch_color_capabilities(attrs, from_cache).await?;
        Ok(())
    }

    async fn refresh(&self, attrs: &AttributeAccessor, from_cache: bool) -> Result<()> {
        self.fetch_color_capabilities(attrs, from_cache).await?;
        Ok(())
    }

    fn color_capabilities(&self) -> Option<ColorCapabilities> {
        *self.capabilities.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{Channel, ChannelState};
    use crate::config::ReportingConfig;
    use crate::error::{ChannelError, TransportError};
    use crate::registry::ChannelTraits;
    use crate::transport::{Call, SimulatedCluster};
    use crate::zcl::AttributeValue;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    /// A color light; `capabilities: None` models a ZCL revision 4 device.
    fn light(capabilities: Option<u64>) -> Arc<SimulatedCluster> {
        let cluster = SimulatedCluster::new(0x0300, 11)
            .with_value(CURRENT_X, AttributeValue::Unsigned(24939))
            .with_value(CURRENT_Y, AttributeValue::Unsigned(24701));
        if let Some(bits) = capabilities {
            cluster.set_value(COLOR_CAPABILITIES, AttributeValue::Bitmap(bits));
        }
        Arc::new(cluster)
    }

    fn color_channel(cluster: &Arc<SimulatedCluster>) -> Channel {
        Channel::new(
            cluster.clone(),
            Box::new(ColorChannel::new()),
            ChannelTraits::bindable(),
            &ReportingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_reported_capabilities_are_used_as_is() {
        for bits in [0x00, 0x08, 0x10, 0x19, 0x1F] {
            let cluster = light(Some(bits));
            cluster.set_unsupported(COLOR_TEMPERATURE);
            let channel = color_channel(&cluster);

            assert_ok!(channel.async_configure().await);
            assert_ok!(channel.async_initialize(true).await);

            assert_eq!(
                channel.get_color_capabilities().map(|c| u64::from(c.bits())),
                Some(bits)
            );
        }
    }

    #[tokio::test]
    async fn test_zcl4_device_with_color_temperature() {
        let cluster = light(None);
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(370));
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);

        assert_eq!(
            channel.get_color_capabilities(),
            Some(ColorCapabilities::COLOR_XY | ColorCapabilities::COLOR_TEMP)
        );
    }

    #[tokio::test]
    async fn test_zcl4_device_without_color_temperature() {
        let cluster = light(None);
        cluster.set_unsupported(COLOR_TEMPERATURE);
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);
        assert_ok!(channel.async_initialize(false).await);

        assert_eq!(
            channel.get_color_capabilities(),
            Some(ColorCapabilities::COLOR_XY)
        );
    }

    #[tokio::test]
    async fn test_zcl4_device_missing_color_temperature() {
        let cluster = light(None);
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);
        assert_eq!(
            channel.get_color_capabilities(),
            Some(ColorCapabilities::COLOR_XY)
        );
    }

    #[tokio::test]
    async fn test_capabilities_read_without_network() {
        let cluster = light(Some(0x18));
        let channel = color_channel(&cluster);
        assert_eq!(channel.get_color_capabilities(), None);

        assert_ok!(channel.async_configure().await);
        assert_ok!(channel.async_initialize(true).await);
        let requests = cluster.request_count();

        let first = channel.get_color_capabilities();
        let second = channel.get_color_capabilities();
        assert_eq!(first, second);
        assert_eq!(first.map(|c| c.bits()), Some(0x18));
        assert_eq!(cluster.request_count(), requests);
    }

    #[tokio::test]
    async fn test_configure_probes_before_reporting() {
        let cluster = light(None);
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(250));
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);

        assert_eq!(
            cluster.calls(),
            vec![
                Call::Read(vec![COLOR_CAPABILITIES.into()]),
                Call::Read(vec![COLOR_TEMPERATURE.into()]),
                Call::Bind,
                Call::ConfigureReporting(CURRENT_X.into()),
                Call::ConfigureReporting(CURRENT_Y.into()),
                Call::ConfigureReporting(COLOR_TEMPERATURE.into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_configure_always_reads_from_network() {
        let cluster = light(Some(0x10));
        let channel = color_channel(&cluster);

        assert_ok!(channel.get_attribute_value(COLOR_CAPABILITIES, false).await);
        assert_ok!(channel.async_configure().await);

        assert_eq!(cluster.reads_of(COLOR_CAPABILITIES), 2);
    }

    #[tokio::test]
    async fn test_warm_initialize_reuses_cached_capabilities() {
        let cluster = light(Some(0x18));
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(370));
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);
        assert_ok!(channel.async_initialize(true).await);

        assert_eq!(cluster.reads_of(COLOR_CAPABILITIES), 1);
    }

    #[tokio::test]
    async fn test_reporting_skips_unsupported_color_modes() {
        let cluster = light(None);
        cluster.set_unsupported(COLOR_TEMPERATURE);
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);

        let reporting: Vec<_> = cluster
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::ConfigureReporting(_)))
            .collect();
        assert_eq!(
            reporting,
            vec![
                Call::ConfigureReporting(CURRENT_X.into()),
                Call::ConfigureReporting(CURRENT_Y.into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_temperature_only_light_skips_xy_reporting() {
        let cluster = light(Some(0x10));
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(370));
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);

        assert!(!cluster.calls().contains(&Call::ConfigureReporting(CURRENT_X.into())));
        assert!(
            cluster
                .calls()
                .contains(&Call::ConfigureReporting(COLOR_TEMPERATURE.into()))
        );
    }

    #[tokio::test]
    async fn test_reporting_failure_still_reaches_ready() {
        let cluster = light(Some(0x18));
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(370));
        cluster.fail_reporting(
            CURRENT_X,
            TransportError::Timeout {
                operation: "configure reporting".into(),
            },
        );
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);
        assert_ok!(channel.async_initialize(true).await);

        assert_eq!(channel.state(), ChannelState::Ready);
        let calls = cluster.calls();
        assert!(calls.contains(&Call::ConfigureReporting(CURRENT_Y.into())));
        assert!(calls.contains(&Call::ConfigureReporting(COLOR_TEMPERATURE.into())));
    }

    #[tokio::test]
    async fn test_probe_timeout_is_not_treated_as_absent() {
        let cluster = light(None);
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(370));
        cluster.fail_reads_of(
            COLOR_CAPABILITIES,
            TransportError::Timeout {
                operation: "read".into(),
            },
        );
        let colors = ColorChannel::new();
        let attrs = AttributeAccessor::new(cluster.clone());

        let err = assert_err!(colors.fetch_color_capabilities(&attrs, false).await);
        assert!(matches!(err, ChannelError::Transport(TransportError::Timeout { .. })));
        assert_eq!(colors.color_capabilities(), None);
        assert_eq!(cluster.reads_of(COLOR_TEMPERATURE), 0);
    }

    #[tokio::test]
    async fn test_probe_timeout_during_configure_is_retried_by_initialize() {
        let cluster = light(Some(0x08));
        cluster.fail_reads_of(
            COLOR_CAPABILITIES,
            TransportError::Timeout {
                operation: "read".into(),
            },
        );
        let channel = color_channel(&cluster);

        assert_ok!(channel.async_configure().await);
        assert_eq!(channel.state(), ChannelState::Configured);
        assert_eq!(channel.get_color_capabilities(), None);

        cluster.clear_read_faults();
        assert_ok!(channel.async_initialize(true).await);
        assert_eq!(
            channel.get_color_capabilities(),
            Some(ColorCapabilities::COLOR_XY)
        );
    }

    #[tokio::test]
    async fn test_unreachable_probe_fails_channel() {
        let cluster = light(Some(0x08));
        cluster.fail_reads_of(COLOR_CAPABILITIES, TransportError::Unreachable);
        let channel = color_channel(&cluster);

        assert_err!(channel.async_configure().await);
        assert_eq!(channel.state(), ChannelState::Failed);
        assert!(!cluster.calls().contains(&Call::Bind));
    }

    #[tokio::test]
    async fn test_explicit_refresh_probes_again() {
        let cluster = light(Some(0x08));
        let channel = color_channel(&cluster);
        assert_ok!(channel.async_configure().await);
        assert_ok!(channel.async_initialize(true).await);

        cluster.set_value(COLOR_CAPABILITIES, AttributeValue::Bitmap(0x18));
        assert_ok!(channel.refresh(true).await);
        assert_eq!(channel.get_color_capabilities().map(|c| c.bits()), Some(0x08));

        assert_ok!(channel.refresh(false).await);
        assert_eq!(channel.get_color_capabilities().map(|c| c.bits()), Some(0x18));
    }

    #[tokio::test]
    async fn test_malformed_capabilities_fall_back_to_probing() {
        let cluster = light(None);
        cluster.set_value(COLOR_CAPABILITIES, AttributeValue::String("rgb".into()));
        cluster.set_value(COLOR_TEMPERATURE, AttributeValue::Unsigned(370));
        let colors = ColorChannel::new();
        let attrs = AttributeAccessor::new(cluster.clone());

        let capabilities = assert_ok!(colors.fetch_color_capabilities(&attrs, false).await);
        assert_eq!(
            capabilities,
            ColorCapabilities::COLOR_XY | ColorCapabilities::COLOR_TEMP
        );
    }
}
