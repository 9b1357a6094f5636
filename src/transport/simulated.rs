//! In-memory cluster for development and testing.
//!
//! Behaves like a device cluster reached over the mesh: attributes can hold a
//! value, answer with a status, or be missing entirely. Every request is
//! recorded so tests can assert on network activity and ordering, and faults
//! can be injected per attribute.

use super::{ClusterHandle, ReadRecord};
use crate::error::TransportError;
use crate::zcl::{AttributeValue, Status};
use async_trait::async_trait;
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A request observed by the simulated cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Read(Vec<String>),
    Write(Vec<String>),
    ConfigureReporting(String),
    Bind,
}

/// Serializable description of a simulated cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub cluster_id: u16,
    #[serde(default = "default_endpoint")]
    pub endpoint_id: u8,
    /// Attributes that hold a value
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
    /// Attributes answered with UNSUPPORTED_ATTRIBUTE
    #[serde(default)]
    pub unsupported: Vec<String>,
    /// Attributes whose configure-reporting request times out
    #[serde(default)]
    pub failing_reports: Vec<String>,
}

fn default_endpoint() -> u8 {
    1
}

pub struct SimulatedCluster {
    cluster_id: u16,
    endpoint_id: u8,
    read_chunk_size: usize,
    latency: Option<Duration>,
    records: RwLock<HashMap<String, ReadRecord>>,
    read_faults: RwLock<HashMap<String, TransportError>>,
    report_faults: RwLock<HashMap<String, TransportError>>,
    report_statuses: RwLock<HashMap<String, Status>>,
    bind_fault: RwLock<Option<TransportError>>,
    calls: Mutex<Vec<Call>>,
}

impl SimulatedCluster {
    pub fn new(cluster_id: u16, endpoint_id: u8) -> Self {
        Self {
            cluster_id,
            endpoint_id,
            read_chunk_size: super::DEFAULT_READ_CHUNK_SIZE,
            latency: None,
            records: RwLock::new(HashMap::new()),
            read_faults: RwLock::new(HashMap::new()),
            report_faults: RwLock::new(HashMap::new()),
            report_statuses: RwLock::new(HashMap::new()),
            bind_fault: RwLock::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn from_profile(profile: DeviceProfile) -> Self {
        let cluster = Self::new(profile.cluster_id, profile.endpoint_id);
        for (name, value) in profile.attributes {
            cluster.set_value(&name, value);
        }
        for name in &profile.unsupported {
            cluster.set_unsupported(name);
        }
        for name in &profile.failing_reports {
            cluster.fail_reporting(
                name,
                TransportError::Timeout {
                    operation: format!("configure reporting for {}", name),
                },
            );
        }
        cluster
    }

    /// Delay every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    pub fn with_value(self, name: &str, value: AttributeValue) -> Self {
        self.set_value(name, value);
        self
    }

    pub fn with_unsupported(self, name: &str) -> Self {
        self.set_unsupported(name);
        self
    }

    pub fn set_value(&self, name: &str, value: AttributeValue) {
        self.records
            .write()
            .insert(name.to_string(), ReadRecord::Value(value));
    }

    pub fn set_unsupported(&self, name: &str) {
        self.records.write().insert(
            name.to_string(),
            ReadRecord::Status(Status::UnsupportedAttribute),
        );
    }

    /// Fail any read request that includes `name`.
    pub fn fail_reads_of(&self, name: &str, error: TransportError) {
        self.read_faults.write().insert(name.to_string(), error);
    }

    pub fn clear_read_faults(&self) {
        self.read_faults.write().clear();
    }

    pub fn fail_reporting(&self, name: &str, error: TransportError) {
        self.report_faults.write().insert(name.to_string(), error);
    }

    /// Answer configure-reporting for `name` with a non-success status.
    pub fn reject_reporting(&self, name: &str, status: Status) {
        self.report_statuses.write().insert(name.to_string(), status);
    }

    pub fn fail_bind(&self, error: TransportError) {
        *self.bind_fault.write() = Some(error);
    }

    /// All requests in the order they were issued.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Total number of requests of any kind.
    pub fn request_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn read_request_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Read(_)))
            .count()
    }

    /// Number of read requests that asked for `name`.
    pub fn reads_of(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Read(names) if names.iter().any(|n| n == name)))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    async fn round_trip(&self, call: Call) {
        debug!(
            "[Sim 0x{:04X}:{}] {:?}",
            self.cluster_id, self.endpoint_id, call
        );
        self.calls.lock().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ClusterHandle for SimulatedCluster {
    fn cluster_id(&self) -> u16 {
        self.cluster_id
    }

    fn endpoint_id(&self) -> u8 {
        self.endpoint_id
    }

    fn max_attributes_per_read(&self) -> usize {
        self.read_chunk_size
    }

    async fn read_attributes(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, ReadRecord>, TransportError> {
        self.round_trip(Call::Read(names.iter().map(|n| n.to_string()).collect()))
            .await;

        let fault = {
            let faults = self.read_faults.read();
            names.iter().find_map(|n| faults.get(*n).cloned())
        };
        if let Some(error) = fault {
            return Err(error);
        }

        let records = self.records.read();
        Ok(names
            .iter()
            .filter_map(|n| records.get(*n).map(|r| (n.to_string(), r.clone())))
            .collect())
    }

    async fn write_attributes(
        &self,
        values: &[(String, AttributeValue)],
    ) -> Result<HashMap<String, Status>, TransportError> {
        self.round_trip(Call::Write(
            values.iter().map(|(n, _)| n.clone()).collect(),
        ))
        .await;

        let mut records = self.records.write();
        let mut statuses = HashMap::new();
        for (name, value) in values {
            let status = match records.get(name) {
                Some(ReadRecord::Value(_)) => {
                    records.insert(name.clone(), ReadRecord::Value(value.clone()));
                    Status::Success
                }
                Some(ReadRecord::Status(status)) => *status,
                None => Status::UnsupportedAttribute,
            };
            statuses.insert(name.clone(), status);
        }
        Ok(statuses)
    }

    async fn configure_reporting(
        &self,
        attribute: &str,
        _min_interval: u16,
        _max_interval: u16,
        _reportable_change: u32,
    ) -> Result<Status, TransportError> {
        self.round_trip(Call::ConfigureReporting(attribute.to_string()))
            .await;

        if let Some(error) = self.report_faults.read().get(attribute).cloned() {
            return Err(error);
        }
        if let Some(status) = self.report_statuses.read().get(attribute).copied() {
            return Ok(status);
        }
        match self.records.read().get(attribute) {
            Some(ReadRecord::Value(_)) => Ok(Status::Success),
            _ => Ok(Status::UnsupportedAttribute),
        }
    }

    async fn bind(&self) -> Result<Status, TransportError> {
        self.round_trip(Call::Bind).await;

        match self.bind_fault.read().clone() {
            Some(error) => Err(error),
            None => Ok(Status::Success),
        }
    }
}
