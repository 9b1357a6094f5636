//! Cluster channels.
//!
//! A [`Channel`] wraps one cluster handle and runs the lifecycle every cluster
//! shares: `configure` (bind, then attribute reporting) followed by
//! `initialize` (warm the attribute cache). Cluster-specific behaviour plugs
//! in through [`ChannelHooks`], which runs before each base step.
//!
//! ```text
//! Uninitialized -> Configuring -> Configured -> Initializing -> Ready
//!                       \                            \
//!                        +--------> Failed <----------+
//! ```
//!
//! `initialize` may also start from `Uninitialized` when a known device is
//! restored and does not need configuring again.

pub mod attributes;
pub mod general;
pub mod lighting;
pub mod reporting;

pub use attributes::{AttributeAccessor, AttributeReadResult, BatchReadResult};
pub use reporting::{ReportFailure, ReportSpec, ReportingOutcome};

use crate::config::ReportingConfig;
use crate::error::{ChannelError, Result, TransportError};
use crate::registry::ChannelTraits;
use crate::transport::ClusterHandle;
use crate::zcl::color::ColorCapabilities;
use crate::zcl::{AttributeValue, ReportPreset, Status};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use strum::Display;
use tokio::sync::broadcast;

const UPDATE_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ChannelState {
    Uninitialized,
    Configuring,
    Configured,
    Initializing,
    Ready,
    Failed,
}

/// An attribute value pushed by the device.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeUpdate {
    pub cluster_id: u16,
    pub endpoint_id: u8,
    pub attribute: String,
    pub value: AttributeValue,
}

/// Cluster-specific extension points of the channel lifecycle.
///
/// All hooks default to no-ops, so a plain cluster only declares what it
/// reports and which attributes it wants cached after initialization.
#[async_trait]
pub trait ChannelHooks: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attributes to report on, with the preset their intervals come from.
    fn report_config(&self) -> &'static [(&'static str, ReportPreset)] {
        &[]
    }

    /// Attributes read into the cache by the base initialize step.
    fn init_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Consulted per report spec after `pre_configure` has run.
    fn should_report(&self, _spec: &ReportSpec) -> bool {
        true
    }

    /// Runs before binding and reporting setup.
    async fn pre_configure(&self, _attrs: &AttributeAccessor) -> Result<()> {
        Ok(())
    }

    /// Runs before the cache is warmed.
    async fn pre_initialize(&self, _attrs: &AttributeAccessor, _from_cache: bool) -> Result<()> {
        Ok(())
    }

    /// Re-derive anything computed by the hooks, on explicit request.
    async fn refresh(&self, _attrs: &AttributeAccessor, _from_cache: bool) -> Result<()> {
        Ok(())
    }

    fn color_capabilities(&self) -> Option<ColorCapabilities> {
        None
    }
}

pub struct Channel {
    hooks: Box<dyn ChannelHooks>,
    traits: ChannelTraits,
    attrs: AttributeAccessor,
    report_config: Vec<ReportSpec>,
    state: Mutex<ChannelState>,
    updates: broadcast::Sender<AttributeUpdate>,
}

impl Channel {
    pub fn new(
        cluster: Arc<dyn ClusterHandle>,
        hooks: Box<dyn ChannelHooks>,
        traits: ChannelTraits,
        reporting: &ReportingConfig,
    ) -> Self {
        let report_config = if traits.client_side {
            Vec::new()
        } else {
            ReportSpec::resolve_all(hooks.report_config(), reporting)
        };
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            hooks,
            traits,
            attrs: AttributeAccessor::new(cluster),
            report_config,
            state: Mutex::new(ChannelState::Uninitialized),
            updates,
        }
    }

    pub fn name(&self) -> &'static str {
        self.hooks.name()
    }

    pub fn cluster_id(&self) -> u16 {
        self.attrs.cluster().cluster_id()
    }

    pub fn endpoint_id(&self) -> u8 {
        self.attrs.cluster().endpoint_id()
    }

    /// Unique within a device: `<endpoint>:0x<cluster>`, with a `:client`
    /// suffix for client-side clusters.
    pub fn id(&self) -> String {
        let id = format!("{}:0x{:04x}", self.endpoint_id(), self.cluster_id());
        if self.traits.client_side {
            format!("{}:client", id)
        } else {
            id
        }
    }

    pub fn traits(&self) -> &ChannelTraits {
        &self.traits
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ChannelState::Ready
    }

    pub fn report_config(&self) -> &[ReportSpec] {
        &self.report_config
    }

    /// Negotiated color capabilities; `None` until probing has succeeded.
    pub fn get_color_capabilities(&self) -> Option<ColorCapabilities> {
        self.hooks.color_capabilities()
    }

    pub async fn get_attribute_value(
        &self,
        name: &str,
        from_cache: bool,
    ) -> Result<AttributeReadResult> {
        Ok(self.attrs.get_attribute_value(name, from_cache).await?)
    }

    pub async fn get_attributes(&self, names: &[&str], from_cache: bool) -> BatchReadResult {
        self.attrs.get_attributes(names, from_cache).await
    }

    pub async fn write_attributes(
        &self,
        values: &[(String, AttributeValue)],
    ) -> Result<HashMap<String, Status>> {
        Ok(self.attrs.write_attributes(values).await?)
    }

    pub fn attribute_updated_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.attrs.updated_at(name)
    }

    /// Handle an attribute report pushed by the device.
    pub fn attribute_updated(&self, name: &str, value: AttributeValue) {
        debug!("{} report {} = {:?}", self.label(), name, value);
        self.attrs.record_report(name, value.clone());
        // No subscribers is fine
        let _ = self.updates.send(AttributeUpdate {
            cluster_id: self.cluster_id(),
            endpoint_id: self.endpoint_id(),
            attribute: name.to_string(),
            value,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttributeUpdate> {
        self.updates.subscribe()
    }

    /// Configure the channel once at device setup: run the variant's
    /// pre-configure hook, then bind and set up attribute reporting.
    pub async fn async_configure(&self) -> Result<()> {
        self.transition(&[ChannelState::Uninitialized], ChannelState::Configuring, "configure")?;

        if let Err(e) = self.hooks.pre_configure(&self.attrs).await {
            self.tolerate(e)?;
        }
        if let Err(e) = self.base_configure().await {
            return Err(self.fail(e));
        }

        self.set_state(ChannelState::Configured);
        Ok(())
    }

    /// Initialize the channel: run the variant's pre-initialize hook, then
    /// warm the attribute cache.
    pub async fn async_initialize(&self, from_cache: bool) -> Result<()> {
        self.transition(
            &[ChannelState::Uninitialized, ChannelState::Configured],
            ChannelState::Initializing,
            "initialize",
        )?;

        if let Err(e) = self.hooks.pre_initialize(&self.attrs, from_cache).await {
            self.tolerate(e)?;
        }
        if let Err(e) = self.base_initialize(from_cache).await {
            return Err(self.fail(e));
        }

        self.set_state(ChannelState::Ready);
        info!("{} ready", self.label());
        Ok(())
    }

    /// Re-run the variant's derived-state probing outside the lifecycle.
    pub async fn refresh(&self, from_cache: bool) -> Result<()> {
        if self.state() == ChannelState::Failed {
            return Err(ChannelError::InvalidState {
                from: ChannelState::Failed,
                action: "refresh",
            });
        }
        self.hooks.refresh(&self.attrs, from_cache).await
    }

    async fn base_configure(&self) -> Result<()> {
        let cluster = self.attrs.cluster();

        if self.traits.bindable {
            match cluster.bind().await {
                Ok(Status::Success) => debug!("{} bound", self.label()),
                Ok(status) => warn!("{} bind rejected: {}", self.label(), status),
                Err(TransportError::Unreachable) => return Err(TransportError::Unreachable.into()),
                Err(e) => warn!("{} failed to bind: {}", self.label(), e),
            }
        }

        let specs = self
            .report_config
            .iter()
            .filter(|spec| {
                let keep = self.hooks.should_report(spec);
                if !keep {
                    debug!("{} skipping reporting for {}", self.label(), spec.attribute);
                }
                keep
            })
            .collect::<Vec<_>>();
        let outcome = reporting::configure_reporting(cluster.as_ref(), specs).await?;
        if let Err(e) = outcome.into_result() {
            warn!("{} {}", self.label(), e);
        }
        Ok(())
    }

    async fn base_initialize(&self, from_cache: bool) -> Result<()> {
        let names = self.hooks.init_attributes();
        if self.traits.client_side || names.is_empty() {
            return Ok(());
        }

        let results = self.attrs.get_attributes(names, from_cache).await;
        if results
            .values()
            .any(|r| matches!(r, Err(TransportError::Unreachable)))
        {
            return Err(TransportError::Unreachable.into());
        }
        debug!(
            "{} cached {}/{} attributes",
            self.label(),
            results.values().filter(|r| matches!(r, Ok(v) if v.is_value())).count(),
            names.len()
        );
        Ok(())
    }

    fn transition(
        &self,
        allowed: &[ChannelState],
        to: ChannelState,
        action: &'static str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !allowed.contains(&*state) {
            return Err(ChannelError::InvalidState {
                from: *state,
                action,
            });
        }
        debug!("{} {} -> {}", self.label(), *state, to);
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: ChannelState) {
        let mut state = self.state.lock();
        debug!("{} {} -> {}", self.label(), *state, to);
        *state = to;
    }

    /// Hook failures that can be retried later leave the lifecycle running.
    fn tolerate(&self, e: ChannelError) -> Result<()> {
        if e.is_recoverable() {
            warn!("{} {} (continuing)", self.label(), e);
            Ok(())
        } else {
            Err(self.fail(e))
        }
    }

    fn fail(&self, e: ChannelError) -> ChannelError {
        error!("{} failed: {}", self.label(), e);
        self.set_state(ChannelState::Failed);
        e
    }

    fn label(&self) -> String {
        format!("[Channel {} {}]", self.name(), self.id())
    }
}
