//! Chip command protocol proxy

use crate::error::{ProtocolError, Result};
use crate::vendor::functions::FN_PROTOCOL_EXECUTE;
use crate::vendor::VendorCommands;

const WORD: usize = 4;

/// Remote command protocol of one component
///
/// The protocol is a stream of 32-bit words executed in order by the
/// device. Long sequences are split on word boundaries.
#[derive(Clone)]
pub struct Protocol {
    commands: VendorCommands,
}

impl Protocol {
    pub(crate) fn new(commands: VendorCommands) -> Self {
        Self { commands }
    }

    /// Execute `words`, optionally collecting one result word per command
    pub fn execute(&self, words: &[u32], results: Option<&mut [u32]>) -> Result<()> {
        match results {
            None => {
                let max_words = (self.commands.max_write_chunk() / WORD).max(1);
                for chunk in words.chunks(max_words) {
                    self.commands
                        .write(FN_PROTOCOL_EXECUTE, &encode_words(chunk))?;
                }
            }
            Some(results) => {
                if results.len() != words.len() {
                    return Err(ProtocolError::Malformed("one result slot per command").into());
                }
                let max_words = (self.commands.max_write_chunk() / WORD)
                    .min(self.commands.max_read_chunk() / WORD)
                    .max(1);
                for (chunk, out) in words.chunks(max_words).zip(results.chunks_mut(max_words)) {
                    let mut raw = vec![0u8; out.len() * WORD];
                    self.commands
                        .transfer_checked(FN_PROTOCOL_EXECUTE, &encode_words(chunk), &mut raw)?;
                    for (value, bytes) in out.iter_mut().zip(raw.chunks_exact(WORD)) {
                        *value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    }
                }
            }
        }
        Ok(())
    }

    /// Set `mask` bits (low 24 bits only) of register `address`
    pub fn set_bits(&self, address: u8, mask: u32) -> Result<()> {
        self.commands.set_bits(address, mask)
    }
}

fn encode_words(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}
