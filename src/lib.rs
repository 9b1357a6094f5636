//! Zigbee cluster channels.
//!
//! A channel wraps a single cluster of a device endpoint and takes it from
//! freshly joined to ready for entity logic: attribute reporting is set up,
//! optional features are negotiated with the device, and commonly used
//! attributes are cached.

pub mod channels;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod transport;
pub mod zcl;

pub use channels::{AttributeReadResult, Channel, ChannelHooks, ChannelState};
pub use error::{ChannelError, Result, TransportError};
pub use pool::ChannelPool;
pub use registry::{ChannelRegistry, ChannelTraits};
