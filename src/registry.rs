//! Cluster-id to channel lookup.
//!
//! The registry is plain data built once at startup and handed to every
//! [`crate::pool::ChannelPool`]. Server-side (input) and client-side (output)
//! clusters are looked up separately since the same cluster id maps to
//! different channels depending on direction.

use crate::channels::ChannelHooks;
use crate::channels::general;
use crate::channels::lighting::{self, ColorChannel};
use crate::zcl::ClusterId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::Display;

/// Entity platform a cluster contributes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityDomain {
    Light,
    Switch,
    Sensor,
    BinarySensor,
}

/// Cross-cutting tags attached to a channel by the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelTraits {
    /// Bind the cluster to the hub during configuration
    pub bindable: bool,
    /// Output cluster; the device sends commands rather than reporting state
    pub client_side: bool,
    pub domain: Option<EntityDomain>,
}

impl ChannelTraits {
    pub fn bindable() -> Self {
        Self {
            bindable: true,
            ..Self::default()
        }
    }

    pub fn client() -> Self {
        Self {
            bindable: true,
            client_side: true,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: EntityDomain) -> Self {
        self.domain = Some(domain);
        self
    }
}

pub type HooksFactory = fn() -> Box<dyn ChannelHooks>;

#[derive(Clone, Copy)]
pub struct RegistryEntry {
    pub factory: HooksFactory,
    pub traits: ChannelTraits,
}

impl RegistryEntry {
    pub fn build(&self) -> Box<dyn ChannelHooks> {
        (self.factory)()
    }
}

#[derive(Clone, Default)]
pub struct ChannelRegistry {
    server: HashMap<u16, RegistryEntry>,
    client: HashMap<u16, RegistryEntry>,
}

impl ChannelRegistry {
    /// An empty registry; every server cluster falls back to a generic channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// The channels this crate ships with.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register_server(
                ClusterId::Basic.id(),
                || Box::new(general::BASIC),
                ChannelTraits::default(),
            )
            .register_server(
                ClusterId::Identify.id(),
                || Box::new(general::IDENTIFY),
                ChannelTraits::default(),
            )
            .register_server(
                ClusterId::OnOff.id(),
                || Box::new(general::ON_OFF),
                ChannelTraits::bindable().with_domain(EntityDomain::Light),
            )
            .register_server(
                ClusterId::LevelControl.id(),
                || Box::new(general::LEVEL),
                ChannelTraits::bindable().with_domain(EntityDomain::Light),
            )
            .register_server(
                ClusterId::ColorControl.id(),
                || Box::new(ColorChannel::new()),
                ChannelTraits::bindable().with_domain(EntityDomain::Light),
            )
            .register_server(
                ClusterId::BallastConfiguration.id(),
                || Box::new(lighting::BALLAST),
                ChannelTraits::default(),
            )
            .register_server(
                ClusterId::TemperatureMeasurement.id(),
                || Box::new(general::TEMPERATURE),
                ChannelTraits::bindable().with_domain(EntityDomain::Sensor),
            )
            .register_server(
                ClusterId::OccupancySensing.id(),
                || Box::new(general::OCCUPANCY),
                ChannelTraits::bindable().with_domain(EntityDomain::BinarySensor),
            )
            .register_client(
                ClusterId::OnOff.id(),
                || Box::new(general::ON_OFF_CLIENT),
                ChannelTraits::client(),
            )
            .register_client(
                ClusterId::ColorControl.id(),
                || Box::new(lighting::COLOR_CLIENT),
                ChannelTraits::client(),
            );
        registry
    }

    pub fn register_server(
        &mut self,
        cluster_id: u16,
        factory: HooksFactory,
        traits: ChannelTraits,
    ) -> &mut Self {
        self.server
            .insert(cluster_id, RegistryEntry { factory, traits });
        self
    }

    pub fn register_client(
        &mut self,
        cluster_id: u16,
        factory: HooksFactory,
        mut traits: ChannelTraits,
    ) -> &mut Self {
        traits.client_side = true;
        self.client
            .insert(cluster_id, RegistryEntry { factory, traits });
        self
    }

    pub fn server(&self, cluster_id: u16) -> Option<&RegistryEntry> {
        self.server.get(&cluster_id)
    }

    pub fn client(&self, cluster_id: u16) -> Option<&RegistryEntry> {
        self.client.get(&cluster_id)
    }

    /// Entry for a server cluster, falling back to a generic channel.
    pub fn server_or_generic(&self, cluster_id: u16) -> RegistryEntry {
        self.server(cluster_id).copied().unwrap_or(RegistryEntry {
            factory: || Box::new(general::GENERIC),
            traits: ChannelTraits::default(),
        })
    }

    pub fn is_bindable(&self, cluster_id: u16) -> bool {
        self.server(cluster_id).is_some_and(|e| e.traits.bindable)
    }

    /// Server clusters grouped into `domain`.
    pub fn clusters_in(&self, domain: EntityDomain) -> Vec<u16> {
        let mut ids: Vec<u16> = self
            .server
            .iter()
            .filter(|(_, e)| e.traits.domain == Some(domain))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
