//! Non-volatile memory proxy

use crate::error::Result;
use crate::vendor::functions::*;
use crate::vendor::VendorCommands;

/// Remote non-volatile memory
#[derive(Clone)]
pub struct Memory {
    commands: VendorCommands,
}

impl Memory {
    pub(crate) fn new(commands: VendorCommands) -> Self {
        Self { commands }
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read(&self, address: u32, buf: &mut [u8]) -> Result<()> {
        let max = self.commands.max_read_chunk().max(1);
        let mut offset = address;
        for chunk in buf.chunks_mut(max) {
            let request = encode_range(offset, chunk.len() as u32);
            self.commands
                .transfer_checked(FN_MEMORY_READ, &request, chunk)?;
            offset += chunk.len() as u32;
        }
        Ok(())
    }

    /// Write `data` starting at `address`
    pub fn write(&self, address: u32, data: &[u8]) -> Result<()> {
        let max = self.commands.max_write_chunk().saturating_sub(4).max(1);
        let mut offset = address;
        for chunk in data.chunks(max) {
            let mut request = Vec::with_capacity(4 + chunk.len());
            request.extend_from_slice(&offset.to_le_bytes());
            request.extend_from_slice(chunk);
            self.commands.write(FN_MEMORY_WRITE, &request)?;
            offset += chunk.len() as u32;
        }
        Ok(())
    }

    /// Erase `length` bytes starting at `address`; waits for completion
    pub fn erase(&self, address: u32, length: u32) -> Result<()> {
        self.commands
            .transfer_checked(FN_MEMORY_ERASE, &encode_range(address, length), &mut [])
    }
}

fn encode_range(address: u32, length: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&address.to_le_bytes());
    out[4..].copy_from_slice(&length.to_le_bytes());
    out
}
