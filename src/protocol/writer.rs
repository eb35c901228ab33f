use uuid::Uuid;

use crate::device::connection::{ConnectionHandle, ConnectorSettings};
use crate::device::transport::Link;
use crate::error::WriteError;
use crate::protocol::command::Command;

/// Sends commands to the command characteristic without waiting for an acknowledgment.
#[derive(Debug, Clone)]
pub struct CharacteristicWriter {
    characteristic_uuid: Uuid,
}

impl CharacteristicWriter {
    pub fn new(characteristic_uuid: Uuid) -> Self {
        CharacteristicWriter { characteristic_uuid }
    }

    pub fn from_settings(settings: &ConnectorSettings) -> Self {
        CharacteristicWriter::new(settings.characteristic_uuid)
    }

    pub async fn write<L: Link>(&self, handle: Option<&ConnectionHandle<L>>, command: &Command) -> Result<(), WriteError> {
        let handle = handle.ok_or(WriteError::NotConnected)?;

        // resolved once, when the connection was established
        let characteristic = handle.target()
            .ok_or(WriteError::CharacteristicNotFound(self.characteristic_uuid))?;

        if !characteristic.is_writable() {
            return Err(WriteError::NotWritable(self.characteristic_uuid));
        }

        handle.link().write_without_response(characteristic, &command.to_bytes()).await?;
        Ok(())
    }
}
