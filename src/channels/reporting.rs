//! Attribute reporting setup.
//!
//! Each report spec is applied on its own. A device that rejects reporting
//! for one attribute still gets the others configured; partial coverage is
//! logged and accepted.

use crate::config::{ReportInterval, ReportingConfig};
use crate::error::{ChannelError, TransportError};
use crate::transport::ClusterHandle;
use crate::zcl::{ReportPreset, Status};
use log::{debug, warn};

/// Reporting subscription for one attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSpec {
    pub attribute: &'static str,
    pub min_interval: u16,
    pub max_interval: u16,
    pub reportable_change: u32,
}

impl ReportSpec {
    pub fn new(attribute: &'static str, interval: ReportInterval) -> Self {
        Self {
            attribute,
            min_interval: interval.min_interval,
            max_interval: interval.max_interval,
            reportable_change: interval.reportable_change,
        }
    }

    /// Resolve a channel's declared `(attribute, preset)` pairs.
    pub fn resolve_all(
        declared: &[(&'static str, ReportPreset)],
        reporting: &ReportingConfig,
    ) -> Vec<Self> {
        declared
            .iter()
            .map(|(attribute, preset)| Self::new(*attribute, reporting.interval(*preset)))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportFailure {
    Status(Status),
    Transport(TransportError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportingOutcome {
    pub configured: Vec<&'static str>,
    pub failed: Vec<(&'static str, ReportFailure)>,
}

impl ReportingOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_result(self) -> Result<(), ChannelError> {
        if self.failed.is_empty() {
            return Ok(());
        }
        Err(ChannelError::ConfigurationPartialFailure {
            attributes: self
                .failed
                .into_iter()
                .map(|(attribute, _)| attribute.to_string())
                .collect(),
        })
    }
}

/// Apply `specs` to `cluster` one attribute at a time.
///
/// Only an unreachable device aborts the pass; every other failure is
/// recorded in the outcome and the next spec is attempted.
pub async fn configure_reporting<'a, I>(
    cluster: &dyn ClusterHandle,
    specs: I,
) -> Result<ReportingOutcome, TransportError>
where
    I: IntoIterator<Item = &'a ReportSpec>,
{
    let mut outcome = ReportingOutcome::default();

    for spec in specs {
        let result = cluster
            .configure_reporting(
                spec.attribute,
                spec.min_interval,
                spec.max_interval,
                spec.reportable_change,
            )
            .await;

        match result {
            Ok(Status::Success) => {
                debug!(
                    "[Cluster 0x{:04X}:{}] reporting for {} set to {}-{}s (change {})",
                    cluster.cluster_id(),
                    cluster.endpoint_id(),
                    spec.attribute,
                    spec.min_interval,
                    spec.max_interval,
                    spec.reportable_change
                );
                outcome.configured.push(spec.attribute);
            }
            Ok(status) => {
                warn!(
                    "[Cluster 0x{:04X}:{}] device rejected reporting for {}: {}",
                    cluster.cluster_id(),
                    cluster.endpoint_id(),
                    spec.attribute,
                    status
                );
                outcome
                    .failed
                    .push((spec.attribute, ReportFailure::Status(status)));
            }
            Err(TransportError::Unreachable) => return Err(TransportError::Unreachable),
            Err(e) => {
                warn!(
                    "[Cluster 0x{:04X}:{}] failed to configure reporting for {}: {}",
                    cluster.cluster_id(),
                    cluster.endpoint_id(),
                    spec.attribute,
                    e
                );
                outcome
                    .failed
                    .push((spec.attribute, ReportFailure::Transport(e)));
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Call, SimulatedCluster};
    use crate::zcl::AttributeValue;
    use tokio_test::assert_err;

    fn specs() -> Vec<ReportSpec> {
        ReportSpec::resolve_all(
            &[
                ("current_x", ReportPreset::Default),
                ("current_y", ReportPreset::Default),
                ("color_temperature", ReportPreset::Default),
            ],
            &ReportingConfig::default(),
        )
    }

    fn light() -> SimulatedCluster {
        SimulatedCluster::new(0x0300, 1)
            .with_value("current_x", AttributeValue::Unsigned(1))
            .with_value("current_y", AttributeValue::Unsigned(2))
            .with_value("color_temperature", AttributeValue::Unsigned(370))
    }

    #[test]
    fn test_resolve_uses_config_intervals() {
        let spec = &specs()[0];
        assert_eq!(spec.attribute, "current_x");
        assert_eq!((spec.min_interval, spec.max_interval), (30, 900));
        assert_eq!(spec.reportable_change, 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_specs() {
        let cluster = light();
        cluster.fail_reporting(
            "current_x",
            TransportError::Timeout {
                operation: "configure reporting".into(),
            },
        );
        cluster.reject_reporting("current_y", Status::UnreportableAttribute);

        let outcome = configure_reporting(&cluster, &specs()).await.unwrap();

        assert_eq!(outcome.configured, vec!["color_temperature"]);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(
            outcome.failed[1],
            ("current_y", ReportFailure::Status(Status::UnreportableAttribute))
        );
        assert_eq!(
            cluster.calls(),
            vec![
                Call::ConfigureReporting("current_x".into()),
                Call::ConfigureReporting("current_y".into()),
                Call::ConfigureReporting("color_temperature".into()),
            ]
        );
        assert_eq!(
            outcome.into_result(),
            Err(ChannelError::ConfigurationPartialFailure {
                attributes: vec!["current_x".into(), "current_y".into()]
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_aborts() {
        let cluster = light();
        cluster.fail_reporting("current_y", TransportError::Unreachable);

        assert_err!(configure_reporting(&cluster, &specs()).await);
        assert_eq!(cluster.request_count(), 2);
    }

    #[tokio::test]
    async fn test_complete_outcome() {
        let cluster = light();
        let outcome = configure_reporting(&cluster, &specs()).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.into_result(), Ok(()));
    }
}
