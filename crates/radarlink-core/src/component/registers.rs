//! Register file proxy

use super::registry::RegisterLayout;
use crate::error::{ProtocolError, Result};
use crate::vendor::functions::*;
use crate::vendor::VendorCommands;

/// Remote register file of one component
///
/// Addresses and values are passed as `u32` and encoded with the widths of
/// the component's [`RegisterLayout`]. Bursts and batches are split on
/// element boundaries so that every vendor command fits one transfer.
#[derive(Clone)]
pub struct Registers {
    commands: VendorCommands,
    layout: RegisterLayout,
}

impl Registers {
    pub(crate) fn new(commands: VendorCommands, layout: RegisterLayout) -> Self {
        Self { commands, layout }
    }

    /// Address and value widths
    pub fn layout(&self) -> RegisterLayout {
        self.layout
    }

    /// Read one register
    pub fn read(&self, address: u32) -> Result<u32> {
        let mut value = [0];
        self.read_burst(address, &mut value)?;
        Ok(value[0])
    }

    /// Write one register
    pub fn write(&self, address: u32, value: u32) -> Result<()> {
        self.write_burst(address, &[value])
    }

    /// Read `values.len()` consecutive registers starting at `address`
    pub fn read_burst(&self, address: u32, values: &mut [u32]) -> Result<()> {
        let value_len = self.layout.value.bytes();
        let max_count = (self.commands.max_read_chunk() / value_len)
            .clamp(1, u16::MAX as usize);

        let mut start = address;
        for chunk in values.chunks_mut(max_count) {
            let mut request = Vec::with_capacity(self.layout.address.bytes() + 2);
            self.layout.address.put(start, &mut request);
            request.extend_from_slice(&(chunk.len() as u16).to_le_bytes());

            let mut raw = vec![0u8; chunk.len() * value_len];
            self.commands
                .transfer_checked(FN_REG_READ_BURST, &request, &mut raw)?;
            for (value, bytes) in chunk.iter_mut().zip(raw.chunks_exact(value_len)) {
                *value = self.layout.value.get(bytes);
            }
            start += chunk.len() as u32;
        }
        Ok(())
    }

    /// Write consecutive registers starting at `address`
    pub fn write_burst(&self, address: u32, values: &[u32]) -> Result<()> {
        self.check_values(values.iter().copied())?;
        let value_len = self.layout.value.bytes();
        let max_count =
            (self.commands.max_write_chunk().saturating_sub(self.layout.address.bytes()) / value_len)
                .max(1);

        let mut start = address;
        for chunk in values.chunks(max_count) {
            let mut request =
                Vec::with_capacity(self.layout.address.bytes() + chunk.len() * value_len);
            self.layout.address.put(start, &mut request);
            for &value in chunk {
                self.layout.value.put(value, &mut request);
            }
            self.commands.write(FN_REG_WRITE_BURST, &request)?;
            start += chunk.len() as u32;
        }
        Ok(())
    }

    /// Read an arbitrary list of registers
    pub fn read_batch(&self, addresses: &[u32], values: &mut [u32]) -> Result<()> {
        if addresses.len() != values.len() {
            return Err(ProtocolError::Malformed("batch address and value counts differ").into());
        }
        let address_len = self.layout.address.bytes();
        let value_len = self.layout.value.bytes();
        let max_count = (self.commands.max_write_chunk() / address_len)
            .min(self.commands.max_read_chunk() / value_len)
            .max(1);

        for (addresses, values) in addresses.chunks(max_count).zip(values.chunks_mut(max_count)) {
            let mut request = Vec::with_capacity(addresses.len() * address_len);
            for &address in addresses {
                self.layout.address.put(address, &mut request);
            }
            let mut raw = vec![0u8; values.len() * value_len];
            self.commands
                .transfer_checked(FN_REG_READ_BATCH, &request, &mut raw)?;
            for (value, bytes) in values.iter_mut().zip(raw.chunks_exact(value_len)) {
                *value = self.layout.value.get(bytes);
            }
        }
        Ok(())
    }

    /// Write a list of (address, value) pairs
    pub fn write_batch(&self, pairs: &[(u32, u32)]) -> Result<()> {
        self.check_values(pairs.iter().map(|&(_, value)| value))?;
        let max_count = (self.commands.max_write_chunk() / self.layout.pair_len()).max(1);

        for chunk in pairs.chunks(max_count) {
            let mut request = Vec::with_capacity(chunk.len() * self.layout.pair_len());
            for &(address, value) in chunk {
                self.layout.address.put(address, &mut request);
                self.layout.value.put(value, &mut request);
            }
            self.commands.write(FN_REG_WRITE_BATCH, &request)?;
        }
        Ok(())
    }

    /// Set `mask` bits of one register on the device side
    pub fn set_bits(&self, address: u32, mask: u32) -> Result<()> {
        self.masked(FN_REG_SET_BITS, address, &[mask])
    }

    /// Clear `mask` bits of one register on the device side
    pub fn clear_bits(&self, address: u32, mask: u32) -> Result<()> {
        self.masked(FN_REG_CLEAR_BITS, address, &[mask])
    }

    /// Clear `clear` bits, then set `set` bits of one register
    pub fn modify_bits(&self, address: u32, clear: u32, set: u32) -> Result<()> {
        self.masked(FN_REG_MODIFY_BITS, address, &[clear, set])
    }

    fn masked(&self, function_id: u8, address: u32, masks: &[u32]) -> Result<()> {
        self.check_values(masks.iter().copied())?;
        let mut request = Vec::with_capacity(self.layout.address.bytes() + masks.len() * 4);
        self.layout.address.put(address, &mut request);
        for &mask in masks {
            self.layout.value.put(mask, &mut request);
        }
        self.commands.write(function_id, &request)
    }

    fn check_values(&self, mut values: impl Iterator<Item = u32>) -> Result<()> {
        let max = self.layout.value.max_value();
        if values.any(|value| value > max) {
            return Err(ProtocolError::Malformed("register value wider than register").into());
        }
        Ok(())
    }
}
