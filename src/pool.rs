//! Per-endpoint channel pool.
//!
//! A pool owns the channels of one device endpoint and drives their
//! lifecycle. Channels run independently of each other: one failing or
//! stalling never blocks or fails its siblings. Removing the device cancels
//! whatever is still in flight.

use crate::channels::{Channel, ChannelState};
use crate::config::{Config, SetupConfig};
use crate::error::{ChannelError, Result};
use crate::registry::ChannelRegistry;
use crate::transport::ClusterHandle;
use futures_util::StreamExt;
use futures_util::stream;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-channel outcome of a pool phase, keyed by channel id.
pub type PhaseReport = BTreeMap<String, Result<()>>;

pub struct ChannelPool {
    endpoint_id: u8,
    channels: Vec<Arc<Channel>>,
    setup: SetupConfig,
    cancel: CancellationToken,
}

impl ChannelPool {
    /// Build channels for an endpoint's server (`in_clusters`) and client
    /// (`out_clusters`) clusters.
    ///
    /// Unknown server clusters get a generic channel; unknown client
    /// clusters get none.
    pub fn new(
        endpoint_id: u8,
        in_clusters: Vec<Arc<dyn ClusterHandle>>,
        out_clusters: Vec<Arc<dyn ClusterHandle>>,
        registry: &ChannelRegistry,
        config: &Config,
    ) -> Self {
        let mut channels = Vec::new();

        for cluster in in_clusters {
            let entry = registry.server_or_generic(cluster.cluster_id());
            channels.push(Arc::new(Channel::new(
                cluster,
                entry.build(),
                entry.traits,
                &config.reporting,
            )));
        }
        for cluster in out_clusters {
            match registry.client(cluster.cluster_id()) {
                Some(entry) => channels.push(Arc::new(Channel::new(
                    cluster,
                    entry.build(),
                    entry.traits,
                    &config.reporting,
                ))),
                None => debug!(
                    "[Pool {}] no client channel for cluster 0x{:04X}",
                    endpoint_id,
                    cluster.cluster_id()
                ),
            }
        }

        Self {
            endpoint_id,
            channels,
            setup: config.setup.clone(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn endpoint_id(&self) -> u8 {
        self.endpoint_id
    }

    pub fn channels(&self) -> &[Arc<Channel>] {
        &self.channels
    }

    /// Server-side channel for `cluster_id`.
    pub fn server_channel(&self, cluster_id: u16) -> Option<&Arc<Channel>> {
        self.channels
            .iter()
            .find(|c| c.cluster_id() == cluster_id && !c.traits().client_side)
    }

    pub fn client_channel(&self, cluster_id: u16) -> Option<&Arc<Channel>> {
        self.channels
            .iter()
            .find(|c| c.cluster_id() == cluster_id && c.traits().client_side)
    }

    /// Channels that completed initialization, for entity logic.
    pub fn ready_channels(&self) -> Vec<Arc<Channel>> {
        self.channels
            .iter()
            .filter(|c| c.is_ready())
            .cloned()
            .collect()
    }

    /// Abandon in-flight configuration; used when the device is removed.
    pub fn cancel(&self) {
        info!("[Pool {}] cancelling channel setup", self.endpoint_id);
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn async_configure(&self) -> PhaseReport {
        self.run_phase("configure", |channel| async move {
            channel.async_configure().await
        })
        .await
    }

    pub async fn async_initialize(&self, from_cache: bool) -> PhaseReport {
        self.run_phase("initialize", move |channel| async move {
            channel.async_initialize(from_cache).await
        })
        .await
    }

    /// Configure (for newly joined devices) and then initialize every
    /// channel. Initialization reads from the cache when the setup config
    /// allows it.
    pub async fn async_setup(&self, configure: bool) -> PhaseReport {
        let mut report = PhaseReport::new();
        if configure {
            report = self.async_configure().await;
        }

        if self.is_cancelled() {
            debug!("[Pool {}] cancelled, skipping initialize", self.endpoint_id);
            return report;
        }

        let initialized = self
            .async_initialize(self.setup.initialize_from_cache)
            .await;
        for (id, result) in initialized {
            if report.get(&id).is_none_or(|r| r.is_ok()) {
                report.insert(id, result);
            }
        }

        info!(
            "[Pool {}] {}/{} channels ready",
            self.endpoint_id,
            self.ready_channels().len(),
            self.channels.len()
        );
        report
    }

    async fn run_phase<F, Fut>(&self, phase: &'static str, op: F) -> PhaseReport
    where
        F: Fn(Arc<Channel>) -> Fut,
        Fut: Future<Output = Result<()>> + Send,
    {
        let limit = self.setup.max_concurrent_channels.max(1);
        let channels: Vec<Arc<Channel>> = self
            .channels
            .iter()
            .filter(|c| c.state() != ChannelState::Failed)
            .cloned()
            .collect();
        let pending: Vec<_> = channels
            .into_iter()
            .map(|channel| {
                let id = channel.id();
                let fut = op(channel);
                let cancel = self.cancel.clone();
                async move {
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ChannelError::Cancelled),
                        result = fut => result,
                    };
                    (id, result)
                }
            })
            .collect();

        let results: PhaseReport = stream::iter(pending)
            .buffer_unordered(limit)
            .collect()
            .await;

        for (id, result) in &results {
            if let Err(e) = result {
                warn!(
                    "[Pool {}] {} of channel {} failed: {}",
                    self.endpoint_id, phase, id, e
                );
            }
        }
        results
    }
}
