//! Transport-facing interface consumed by the channel layer.
//!
//! The radio driver, addressing and mesh routing live behind [`ClusterHandle`].
//! A handle identifies one cluster instance on one device endpoint and is owned
//! by the transport; channels hold it behind an `Arc` without managing its
//! lifetime. Requests against the same handle are serialized by the transport.

pub mod simulated;

use crate::error::TransportError;
use crate::zcl::{AttributeValue, Status};
use async_trait::async_trait;
use std::collections::HashMap;

pub use simulated::{Call, DeviceProfile, SimulatedCluster};

/// Attributes requested per read frame when the transport does not say otherwise.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 5;

/// One attribute record of a read-attributes response.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadRecord {
    Value(AttributeValue),
    Status(Status),
}

#[async_trait]
pub trait ClusterHandle: Send + Sync {
    fn cluster_id(&self) -> u16;

    fn endpoint_id(&self) -> u8;

    /// How many attributes fit in one read request.
    fn max_attributes_per_read(&self) -> usize {
        DEFAULT_READ_CHUNK_SIZE
    }

    /// Read attributes by name.
    ///
    /// An attribute missing from the returned map came back with no record at
    /// all. A transport error fails every attribute of the request.
    async fn read_attributes(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, ReadRecord>, TransportError>;

    async fn write_attributes(
        &self,
        values: &[(String, AttributeValue)],
    ) -> Result<HashMap<String, Status>, TransportError>;

    async fn configure_reporting(
        &self,
        attribute: &str,
        min_interval: u16,
        max_interval: u16,
        reportable_change: u32,
    ) -> Result<Status, TransportError>;

    async fn bind(&self) -> Result<Status, TransportError>;
}
