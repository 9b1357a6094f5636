//! Attribute access with an in-memory cache.
//!
//! The accessor is the only writer of a channel's attribute cache: network
//! reads, successful writes and incoming reports all land here. Reads can be
//! served from the cache or forced onto the network per call.

use crate::error::TransportError;
use crate::transport::{ClusterHandle, ReadRecord};
use crate::zcl::{AttributeValue, Status};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of reading one attribute.
///
/// `Unsupported` and `Absent` are different facts: the first is the device
/// explicitly rejecting an attribute the protocol defines, the second is an
/// attribute that came back with no record at all (typically an older
/// protocol revision that never defined it).
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeReadResult {
    Value(AttributeValue),
    Unsupported,
    Absent,
}

impl AttributeReadResult {
    fn from_record(name: &str, record: Option<ReadRecord>) -> Self {
        match record {
            Some(ReadRecord::Value(value)) => AttributeReadResult::Value(value),
            Some(ReadRecord::Status(Status::UnsupportedAttribute)) => {
                AttributeReadResult::Unsupported
            }
            Some(ReadRecord::Status(status)) => {
                debug!("Attribute {} read returned status {}", name, status);
                AttributeReadResult::Absent
            }
            None => AttributeReadResult::Absent,
        }
    }

    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            AttributeReadResult::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, AttributeReadResult::Value(_))
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    result: AttributeReadResult,
    updated_at: DateTime<Utc>,
}

pub type BatchReadResult = HashMap<String, Result<AttributeReadResult, TransportError>>;

pub struct AttributeAccessor {
    cluster: Arc<dyn ClusterHandle>,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl AttributeAccessor {
    pub fn new(cluster: Arc<dyn ClusterHandle>) -> Self {
        Self {
            cluster,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterHandle> {
        &self.cluster
    }

    /// Read a single attribute.
    ///
    /// With `from_cache` set, a cached value or cached unsupported
    /// determination is returned without touching the network.
    pub async fn get_attribute_value(
        &self,
        name: &str,
        from_cache: bool,
    ) -> Result<AttributeReadResult, TransportError> {
        self.get_attributes(&[name], from_cache)
            .await
            .remove(name)
            .unwrap_or(Ok(AttributeReadResult::Absent))
    }

    /// Read several attributes, batching network reads into chunks the
    /// transport accepts. A failed chunk only fails its own attributes.
    pub async fn get_attributes(&self, names: &[&str], from_cache: bool) -> BatchReadResult {
        let mut results = BatchReadResult::new();
        let mut to_read: Vec<&str> = Vec::new();

        for name in names {
            if results.contains_key(*name) || to_read.contains(name) {
                continue;
            }
            match self.cached(name).filter(|_| from_cache) {
                Some(result) => {
                    results.insert(name.to_string(), Ok(result));
                }
                None => to_read.push(*name),
            }
        }

        let chunk_size = self.cluster.max_attributes_per_read().max(1);
        for chunk in to_read.chunks(chunk_size) {
            match self.cluster.read_attributes(chunk).await {
                Ok(mut records) => {
                    for name in chunk {
                        let result = AttributeReadResult::from_record(name, records.remove(*name));
                        self.store(name, &result);
                        results.insert(name.to_string(), Ok(result));
                    }
                }
                Err(e) => {
                    warn!(
                        "[Cluster 0x{:04X}:{}] failed to read {:?}: {}",
                        self.cluster.cluster_id(),
                        self.cluster.endpoint_id(),
                        chunk,
                        e
                    );
                    for name in chunk {
                        results.insert(name.to_string(), Err(e.clone()));
                    }
                }
            }
        }

        results
    }

    /// Write attributes; attributes acknowledged with success are cached.
    pub async fn write_attributes(
        &self,
        values: &[(String, AttributeValue)],
    ) -> Result<HashMap<String, Status>, TransportError> {
        let statuses = self.cluster.write_attributes(values).await?;
        for (name, value) in values {
            if statuses.get(name).copied().is_some_and(Status::is_success) {
                self.store(name, &AttributeReadResult::Value(value.clone()));
            }
        }
        Ok(statuses)
    }

    /// Record a value pushed by the device through attribute reporting.
    pub(crate) fn record_report(&self, name: &str, value: AttributeValue) {
        self.store(name, &AttributeReadResult::Value(value));
    }

    /// When the cached entry for `name` was last refreshed.
    pub fn updated_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.cache.read().get(name).map(|entry| entry.updated_at)
    }

    fn cached(&self, name: &str) -> Option<AttributeReadResult> {
        self.cache.read().get(name).map(|entry| entry.result.clone())
    }

    fn store(&self, name: &str, result: &AttributeReadResult) {
        // Absent is resolved on the next network read rather than remembered
        if matches!(result, AttributeReadResult::Absent) {
            return;
        }
        self.cache.write().insert(
            name.to_string(),
            CacheEntry {
                result: result.clone(),
                updated_at: Utc::now(),
            },
        );
    }
}
