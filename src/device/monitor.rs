use std::sync::Arc;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use log::{info, warn};

use crate::device::connection::ScannerConnector;
use crate::device::transport::Radio;
use crate::device::types::AdapterState;
use crate::error::DeviceError;

/// Follows the power state of the adapter and starts or stops scanning accordingly.
pub struct AdapterMonitor<R: Radio> {
    radio: Arc<R>,
    states: Option<BoxStream<'static, AdapterState>>,
    released: bool,
}

impl<R: Radio> AdapterMonitor<R> {
    pub fn new(radio: Arc<R>) -> Self {
        AdapterMonitor {
            radio,
            states: None,
            released: false,
        }
    }

    /// Subscribes to power state changes. The current state is delivered first.
    pub async fn subscribe(&mut self) -> Result<(), DeviceError> {
        if self.released {
            return Ok(());
        }

        let initial = self.radio.adapter_state().await?;
        let transitions = self.radio.adapter_events().await?;

        self.states = Some(stream::once(future::ready(initial)).chain(transitions).fuse().boxed());
        Ok(())
    }

    pub fn is_subscribed(&self) -> bool {
        self.states.is_some()
    }

    /// Waits for the next power state. Never resolves while unsubscribed.
    pub async fn next_state(&mut self) -> Option<AdapterState> {
        match self.states.as_mut() {
            Some(states) => {
                let next = states.next().await;
                if next.is_none() {
                    warn!("Adapter state updates ended");
                    self.states = None;
                }
                next
            },
            None => future::pending().await,
        }
    }

    // `&mut self`: the state stream is not Sync
    pub async fn apply(&mut self, state: AdapterState, connector: &mut ScannerConnector<R>) {
        if state == AdapterState::PoweredOn {
            info!("Bluetooth is enabled");
            connector.start_scan().await;
        } else {
            warn!("Bluetooth is not enabled ({:?})", state);
            if connector.is_scanning() {
                connector.stop_scan().await;
            }
        }
    }

    /// Drops the subscription and releases the adapter. Repeated calls do nothing.
    pub fn teardown(&mut self) {
        if self.released {
            return;
        }

        self.states = None;
        self.radio.release();
        self.released = true;
        info!("Adapter monitor released");
    }
}
