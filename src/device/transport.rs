//! The seam between the connection state machine and a bluetooth stack.
//!
//! [`crate::device::btle`] implements these traits on top of btleplug. The state machine only
//! ever talks to a [`Radio`] and the [`Link`]s it hands out.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::device::types::{AdapterState, CharacteristicRef, DeviceDescriptor, DeviceId, RadioEvent};
use crate::error::DeviceError;

#[async_trait]
pub trait Radio: Send + Sync + 'static {
    type Link: Link;

    /// Current power state of the adapter.
    async fn adapter_state(&self) -> Result<AdapterState, DeviceError>;

    /// Power state transitions, not including the current state.
    async fn adapter_events(&self) -> Result<BoxStream<'static, AdapterState>, DeviceError>;

    /// Advertisements and disconnects of peripherals.
    async fn device_events(&self) -> Result<BoxStream<'static, RadioEvent>, DeviceError>;

    /// Starts an unfiltered scan; filtering happens on the received advertisements.
    async fn start_scan(&self) -> Result<(), DeviceError>;

    async fn stop_scan(&self) -> Result<(), DeviceError>;

    async fn link(&self, device: &DeviceDescriptor) -> Result<Self::Link, DeviceError>;

    /// Asks the adapter, not the link, whether the peripheral is connected.
    async fn is_device_connected(&self, id: &DeviceId) -> Result<bool, DeviceError>;

    /// Releases the adapter. Called once, when the session ends.
    fn release(&self);
}

#[async_trait]
pub trait Link: Clone + Send + Sync + 'static {
    fn id(&self) -> DeviceId;

    async fn connect(&self) -> Result<(), DeviceError>;

    /// Discovers all services and returns every characteristic found.
    async fn discover(&self) -> Result<Vec<CharacteristicRef>, DeviceError>;

    async fn is_connected(&self) -> Result<bool, DeviceError>;

    async fn disconnect(&self) -> Result<(), DeviceError>;

    async fn write_without_response(&self, characteristic: &CharacteristicRef, payload: &[u8]) -> Result<(), DeviceError>;
}
