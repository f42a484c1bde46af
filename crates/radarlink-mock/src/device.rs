//! Emulated board firmware
//!
//! [`MockBoard`] consumes raw request transfers exactly as a board would
//! receive them and queues the response transfers a board would send.
//! Chunked commands are reassembled per address; the component behind the
//! address then runs the command against in-memory state. A chunk with the
//! START flag drops whatever was left of an earlier command to the same
//! address.

use radarlink_core::bridge::{BoardInfo, VersionInfo};
use radarlink_core::component::{
    Capabilities, ComponentAddress, ComponentKind, ComponentType, SubInterface,
};
use radarlink_core::error::ProtocolError;
use radarlink_core::vendor::functions::*;
use radarlink_core::vendor::wire::{self, RequestHeader, RequestKind, ResponseHeader};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Outcome of one command: result bytes or a non-zero status
type Outcome = Result<Vec<u8>, u16>;

/// Configuration for the emulated board
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Board identity returned by the board info query
    pub info: BoardInfo,
    /// Firmware version
    pub version: VersionInfo,
    /// Board uuid
    pub uuid: [u8; BOARD_UUID_LEN],
    /// Maximum transfer size of the mock link
    pub max_transfer: usize,
    /// Components fitted, with instance counts
    pub components: Vec<(ComponentKind, u8)>,
    /// Size of the emulated flash memory
    pub memory_size: usize,
    /// Data bytes in every streamed frame
    pub frame_len: usize,
    /// Pause between streamed frames
    pub frame_interval: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            info: BoardInfo {
                vid: 0x058B,
                pid: 0x0251,
                name: "RadarBaseboardMCU7".into(),
            },
            version: VersionInfo {
                major: 2,
                minor: 5,
                patch: 1,
                build: 42,
            },
            uuid: *b"mock-board-00001",
            // small on purpose so that ordinary commands get chunked
            max_transfer: 64,
            components: vec![
                (ComponentKind::RadarAvian, 1),
                (ComponentKind::PowerSupplyMax20430, 1),
                (ComponentKind::MemoryFlash, 1),
            ],
            memory_size: 4096,
            frame_len: 256,
            frame_interval: Duration::from_millis(1),
        }
    }
}

/// One reassembled command as executed by the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    /// Target address
    pub address: ComponentAddress,
    /// Function id
    pub function_id: u8,
    /// Request kind of the chunks carrying the payload
    pub kind: RequestKind,
    /// Reassembled payload
    pub payload: Vec<u8>,
    /// Status the board answered with
    pub status: u16,
}

/// Emulated pin state of one component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinState {
    /// Reset line asserted
    pub reset_asserted: bool,
    /// Number of reset pulses seen
    pub reset_pulses: u32,
    /// Interrupt line level
    pub irq: bool,
    /// Detection output bits
    pub detection: u8,
}

/// (type, implementation, instance) of a component, sub-interface ignored
type ComponentKey = (u8, u8, u8);

struct Pending {
    function_id: u8,
    kind: RequestKind,
    payload: Vec<u8>,
}

struct Answer {
    function_id: u8,
    outcome: Outcome,
    position: usize,
}

/// In-memory radar board
pub struct MockBoard {
    config: MockConfig,
    registers: HashMap<ComponentKey, HashMap<u32, u32>>,
    pins: HashMap<ComponentKey, PinState>,
    memory: Vec<u8>,
    pending: HashMap<[u8; 4], Pending>,
    answers: HashMap<[u8; 4], Answer>,
    responses: VecDeque<Vec<u8>>,
    injected: HashMap<(ComponentAddress, u8), u16>,
    transfers: Vec<Vec<u8>>,
    executed: Vec<ExecutedCommand>,
    protocol_words: Vec<u32>,
    stalled: bool,
    sends_stalled: bool,
    send_failure: Option<usize>,
    unavailable: bool,
}

impl MockBoard {
    /// Create a board from `config`
    pub fn new(config: MockConfig) -> Self {
        let memory = vec![0xFF; config.memory_size];
        Self {
            config,
            registers: HashMap::new(),
            pins: HashMap::new(),
            memory,
            pending: HashMap::new(),
            answers: HashMap::new(),
            responses: VecDeque::new(),
            injected: HashMap::new(),
            transfers: Vec::new(),
            executed: Vec::new(),
            protocol_words: Vec::new(),
            stalled: false,
            sends_stalled: false,
            send_failure: None,
            unavailable: false,
        }
    }

    /// Create a board with the default configuration
    pub fn new_default() -> Self {
        Self::new(MockConfig::default())
    }

    /// Configuration
    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Test hooks
    // ------------------------------------------------------------------

    /// Answer every `function_id` command to `address` with `status`
    pub fn inject_status(&mut self, address: ComponentAddress, function_id: u8, status: u16) {
        self.injected.insert((address, function_id), status);
    }

    /// Remove all injected failures
    pub fn clear_injected(&mut self) {
        self.injected.clear();
    }

    /// Stop answering reads (requests are still recorded)
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Block request transfers until unstalled
    pub fn set_sends_stalled(&mut self, stalled: bool) {
        self.sends_stalled = stalled;
    }

    /// Whether request transfers are blocked
    pub fn sends_stalled(&self) -> bool {
        self.sends_stalled
    }

    /// Let `delivered` more request transfers through, then lose one
    ///
    /// The lost transfer never reaches the board and its send times out.
    pub fn fail_send_after(&mut self, delivered: usize) {
        self.send_failure = Some(delivered);
    }

    /// Consume one send from the failure countdown; true if it is lost
    pub fn take_send_failure(&mut self) -> bool {
        match self.send_failure {
            Some(0) => {
                self.send_failure = None;
                true
            }
            Some(left) => {
                self.send_failure = Some(left - 1);
                false
            }
            None => false,
        }
    }

    /// Make the link refuse to open
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Whether the link should refuse to open
    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    /// Register value of a component instance
    pub fn register(&self, kind: ComponentKind, instance_id: u8, address: u32) -> u32 {
        self.registers
            .get(&key_of(kind, instance_id))
            .and_then(|file| file.get(&address))
            .copied()
            .unwrap_or(0)
    }

    /// Preset a register value
    pub fn set_register(&mut self, kind: ComponentKind, instance_id: u8, address: u32, value: u32) {
        self.registers
            .entry(key_of(kind, instance_id))
            .or_default()
            .insert(address, value);
    }

    /// Pin state of a component instance
    pub fn pins(&self, kind: ComponentKind, instance_id: u8) -> PinState {
        self.pins
            .get(&key_of(kind, instance_id))
            .copied()
            .unwrap_or_default()
    }

    /// Mutable pin state of a component instance
    pub fn pins_mut(&mut self, kind: ComponentKind, instance_id: u8) -> &mut PinState {
        self.pins.entry(key_of(kind, instance_id)).or_default()
    }

    /// Emulated flash contents
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Every request transfer received, in order
    pub fn transfers(&self) -> &[Vec<u8>] {
        &self.transfers
    }

    /// Every command executed, in order
    pub fn executed(&self) -> &[ExecutedCommand] {
        &self.executed
    }

    /// Number of executions of `function_id` on `address`
    pub fn execution_count(&self, address: ComponentAddress, function_id: u8) -> usize {
        self.executed
            .iter()
            .filter(|c| c.address == address && c.function_id == function_id)
            .count()
    }

    /// Protocol words received through the execute function, in order
    pub fn protocol_words(&self) -> &[u32] {
        &self.protocol_words
    }

    // ------------------------------------------------------------------
    // Wire side
    // ------------------------------------------------------------------

    /// Feed one request transfer to the board
    ///
    /// Requests that cannot be decoded are dropped with an error, like
    /// firmware ignoring garbage on the control pipe.
    pub fn handle_request(&mut self, transfer: &[u8]) -> Result<(), ProtocolError> {
        self.transfers.push(transfer.to_vec());
        let (header, payload) = RequestHeader::parse(transfer)?;
        let kind = header.kind()?;
        let raw = header.address_bytes();
        let address = ComponentAddress::from_wire(raw)?;
        let length = header.length.get() as usize;

        if header.start() {
            let aborted = self.pending.remove(&raw).is_some() | self.answers.remove(&raw).is_some();
            if aborted {
                log::warn!("mock: {} dropping remains of an aborted command", address);
            }
        }

        match kind {
            RequestKind::Write | RequestKind::Transfer => {
                if payload.len() != length {
                    return Err(ProtocolError::Malformed("payload length mismatch"));
                }
                let pending = self.pending.entry(raw).or_insert_with(|| Pending {
                    function_id: header.function_id,
                    kind,
                    payload: Vec::new(),
                });
                if pending.function_id != header.function_id || pending.kind != kind {
                    log::warn!("mock: {} interrupted command restarted", address);
                    *pending = Pending {
                        function_id: header.function_id,
                        kind,
                        payload: Vec::new(),
                    };
                }
                pending.payload.extend_from_slice(payload);

                if !header.more() {
                    if let Some(done) = self.pending.remove(&raw) {
                        let outcome = self.run(address, done.function_id, done.kind, done.payload);
                        if kind == RequestKind::Transfer {
                            self.answers.insert(
                                raw,
                                Answer {
                                    function_id: done.function_id,
                                    outcome,
                                    position: 0,
                                },
                            );
                        }
                    }
                }
            }
            RequestKind::Read => {
                let stale = self
                    .answers
                    .get(&raw)
                    .is_some_and(|a| a.function_id != header.function_id);
                if stale {
                    self.answers.remove(&raw);
                }
                if !self.answers.contains_key(&raw) {
                    let outcome = self.run(address, header.function_id, kind, Vec::new());
                    self.answers.insert(
                        raw,
                        Answer {
                            function_id: header.function_id,
                            outcome,
                            position: 0,
                        },
                    );
                }
                let response = self.serve(raw, header.request, length, header.more());
                if !self.stalled {
                    self.responses.push_back(response);
                }
            }
        }
        Ok(())
    }

    /// Next response transfer waiting to be read by the host
    pub fn take_response(&mut self) -> Option<Vec<u8>> {
        self.responses.pop_front()
    }

    fn serve(&mut self, raw: [u8; 4], request: u8, want: usize, more: bool) -> Vec<u8> {
        let Some(answer) = self.answers.get_mut(&raw) else {
            return wire::encode_response(&ResponseHeader::new(request, wire::STATUS_BAD_PAYLOAD, 0), &[]);
        };
        let response = match &answer.outcome {
            Ok(data) => {
                let start = answer.position.min(data.len());
                let end = (start + want).min(data.len());
                answer.position = end;
                let chunk = &data[start..end];
                wire::encode_response(&ResponseHeader::new(request, 0, chunk.len() as u16), chunk)
            }
            Err(status) => wire::encode_response(&ResponseHeader::new(request, *status, 0), &[]),
        };
        if !more || answer.outcome.is_err() {
            self.answers.remove(&raw);
        }
        response
    }

    fn run(&mut self, address: ComponentAddress, function_id: u8, kind: RequestKind, payload: Vec<u8>) -> Outcome {
        let outcome = match self.injected.get(&(address, function_id)) {
            Some(&status) => Err(status),
            None => self.execute(address, function_id, &payload),
        };
        let status = outcome.as_ref().err().copied().unwrap_or(wire::STATUS_OK);
        log::debug!(
            "mock: {} fn {:#04x} {} bytes -> status {:#06x}",
            address,
            function_id,
            payload.len(),
            status
        );
        self.executed.push(ExecutedCommand {
            address,
            function_id,
            kind,
            payload,
            status,
        });
        outcome
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    fn execute(&mut self, address: ComponentAddress, function_id: u8, payload: &[u8]) -> Outcome {
        if address.component_type() == ComponentType::Board {
            return self.execute_board(function_id);
        }
        let kind = self.fitted(&address).ok_or(wire::STATUS_NO_COMPONENT)?;
        let key = (
            address.component_type() as u8,
            address.implementation(),
            address.instance_id(),
        );
        let caps = kind.capabilities();

        match address.sub_interface() {
            SubInterface::Registers if kind.info().registers.is_some() => {
                self.execute_registers(kind, key, function_id, payload)
            }
            SubInterface::Pins if caps.contains(Capabilities::PINS) => {
                self.execute_pins(key, function_id, payload)
            }
            SubInterface::Protocol if caps.contains(Capabilities::PROTOCOL) => {
                self.execute_protocol(key, function_id, payload)
            }
            SubInterface::Default if caps.contains(Capabilities::MEMORY) => {
                self.execute_memory(function_id, payload)
            }
            _ => Err(wire::STATUS_NOT_SUPPORTED),
        }
    }

    fn fitted(&self, address: &ComponentAddress) -> Option<ComponentKind> {
        self.config
            .components
            .iter()
            .find(|(kind, count)| {
                let info = kind.info();
                info.component_type == address.component_type()
                    && info.implementation == address.implementation()
                    && address.instance_id() < *count
            })
            .map(|(kind, _)| *kind)
    }

    fn execute_board(&mut self, function_id: u8) -> Outcome {
        match function_id {
            FN_BOARD_INFO => Ok(self.config.info.encode()),
            FN_VERSION_INFO => Ok(self.config.version.encode().to_vec()),
            FN_BOARD_UUID => Ok(self.config.uuid.to_vec()),
            FN_ERROR_INFO => {
                let last = self
                    .executed
                    .iter()
                    .rev()
                    .find(|c| c.status != wire::STATUS_OK)
                    .map_or(0, |c| u32::from(c.status));
                Ok(last.to_le_bytes().to_vec())
            }
            _ => Err(wire::STATUS_NOT_SUPPORTED),
        }
    }

    fn execute_registers(
        &mut self,
        kind: ComponentKind,
        key: ComponentKey,
        function_id: u8,
        payload: &[u8],
    ) -> Outcome {
        let layout = kind.info().registers.ok_or(wire::STATUS_NOT_SUPPORTED)?;
        let aw = layout.address.bytes();
        let vw = layout.value.bytes();
        let file = self.registers.entry(key).or_default();

        match function_id {
            FN_REG_READ_BURST => {
                if payload.len() != aw + 2 {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                }
                let start = layout.address.get(payload);
                let count = u16::from_le_bytes([payload[aw], payload[aw + 1]]) as u32;
                let mut out = Vec::with_capacity(count as usize * vw);
                for address in start..start + count {
                    layout.value.put(read_register(file, address), &mut out);
                }
                Ok(out)
            }
            FN_REG_WRITE_BURST => {
                if payload.len() < aw || (payload.len() - aw) % vw != 0 {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                }
                let start = layout.address.get(payload);
                for (offset, value) in payload[aw..].chunks_exact(vw).enumerate() {
                    file.insert(start + offset as u32, layout.value.get(value));
                }
                Ok(Vec::new())
            }
            FN_REG_READ_BATCH => {
                if payload.len() % aw != 0 {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                }
                let mut out = Vec::with_capacity(payload.len() / aw * vw);
                for address in payload.chunks_exact(aw) {
                    layout.value.put(read_register(file, layout.address.get(address)), &mut out);
                }
                Ok(out)
            }
            FN_REG_WRITE_BATCH => {
                if payload.len() % layout.pair_len() != 0 {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                }
                for pair in payload.chunks_exact(layout.pair_len()) {
                    file.insert(layout.address.get(pair), layout.value.get(&pair[aw..]));
                }
                Ok(Vec::new())
            }
            FN_REG_SET_BITS | FN_REG_CLEAR_BITS | FN_REG_MODIFY_BITS => {
                let masks = if function_id == FN_REG_MODIFY_BITS { 2 } else { 1 };
                if payload.len() != aw + masks * vw {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                }
                let address = layout.address.get(payload);
                let first = layout.value.get(&payload[aw..]);
                let value = read_register(file, address);
                let value = match function_id {
                    FN_REG_SET_BITS => value | first,
                    FN_REG_CLEAR_BITS => value & !first,
                    _ => (value & !first) | layout.value.get(&payload[aw + vw..]),
                };
                file.insert(address, value);
                Ok(Vec::new())
            }
            _ => Err(wire::STATUS_NOT_SUPPORTED),
        }
    }

    fn execute_pins(&mut self, key: ComponentKey, function_id: u8, payload: &[u8]) -> Outcome {
        let pins = self.pins.entry(key).or_default();
        match function_id {
            FN_PINS_SET_RESET => {
                let [state] = payload else {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                };
                pins.reset_asserted = *state != 0;
                Ok(Vec::new())
            }
            FN_PINS_RESET => {
                pins.reset_pulses += 1;
                self.registers.remove(&key);
                Ok(Vec::new())
            }
            FN_PINS_GET_IRQ => Ok(vec![pins.irq as u8]),
            FN_PINS_GET_DETECTION => Ok(vec![pins.detection]),
            _ => Err(wire::STATUS_NOT_SUPPORTED),
        }
    }

    /// Protocol words follow the Avian SPI format: 7-bit register address
    /// in bits 31..25, write flag in bit 24, data in bits 23..0. Every word
    /// answers with the register content before the write.
    fn execute_protocol(&mut self, key: ComponentKey, function_id: u8, payload: &[u8]) -> Outcome {
        if payload.len() % 4 != 0 {
            return Err(wire::STATUS_BAD_PAYLOAD);
        }
        let words: Vec<u32> = payload
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let file = self.registers.entry(key).or_default();

        match function_id {
            FN_PROTOCOL_SET_BITS => {
                for &word in &words {
                    let address = word >> 24;
                    *file.entry(address).or_default() |= word & SET_BITS_MASK;
                }
                self.protocol_words.extend_from_slice(&words);
                Ok(Vec::new())
            }
            FN_PROTOCOL_EXECUTE => {
                let mut out = Vec::with_capacity(payload.len());
                for &word in &words {
                    let address = word >> 25;
                    let old = file.get(&address).copied().unwrap_or(0);
                    if word & (1 << 24) != 0 {
                        file.insert(address, word & SET_BITS_MASK);
                    }
                    out.extend_from_slice(&((address << 25) | (old & SET_BITS_MASK)).to_le_bytes());
                }
                self.protocol_words.extend_from_slice(&words);
                Ok(out)
            }
            _ => Err(wire::STATUS_NOT_SUPPORTED),
        }
    }

    fn execute_memory(&mut self, function_id: u8, payload: &[u8]) -> Outcome {
        let range = |payload: &[u8]| -> Result<(usize, usize), u16> {
            if payload.len() < 8 {
                return Err(wire::STATUS_BAD_PAYLOAD);
            }
            let address = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
            let length = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;
            Ok((address, length))
        };
        let size = self.memory.len();
        let bounded = |address: usize, length: usize| {
            address
                .checked_add(length)
                .filter(|&end| end <= size)
                .map(|end| address..end)
                .ok_or(wire::STATUS_BAD_PAYLOAD)
        };

        match function_id {
            FN_MEMORY_READ => {
                let (address, length) = range(payload)?;
                Ok(self.memory[bounded(address, length)?].to_vec())
            }
            FN_MEMORY_WRITE => {
                if payload.len() < 4 {
                    return Err(wire::STATUS_BAD_PAYLOAD);
                }
                let address = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
                let data = &payload[4..];
                let span = bounded(address, data.len())?;
                self.memory[span].copy_from_slice(data);
                Ok(Vec::new())
            }
            FN_MEMORY_ERASE => {
                let (address, length) = range(payload)?;
                let span = bounded(address, length)?;
                self.memory[span].fill(0xFF);
                Ok(Vec::new())
            }
            _ => Err(wire::STATUS_NOT_SUPPORTED),
        }
    }
}

fn read_register(file: &HashMap<u32, u32>, address: u32) -> u32 {
    file.get(&address).copied().unwrap_or(0)
}

fn key_of(kind: ComponentKind, instance_id: u8) -> ComponentKey {
    let info = kind.info();
    (info.component_type as u8, info.implementation, instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarlink_core::vendor::wire::encode_request;

    fn request(kind: RequestKind, more: bool, address: &ComponentAddress, fid: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let header = RequestHeader::new(kind, more, address, fid, payload.len() as u16);
        encode_request(&header, payload, &mut out);
        out
    }

    fn read(address: &ComponentAddress, fid: u8, len: u16, more: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let header = RequestHeader::new(RequestKind::Read, more, address, fid, len);
        encode_request(&header, &[], &mut out);
        out
    }

    #[test]
    fn test_board_info_read() {
        let mut board = MockBoard::new_default();
        board
            .handle_request(&read(&ComponentAddress::BOARD, FN_BOARD_INFO, 32, false))
            .unwrap();
        let response = board.take_response().unwrap();
        let (header, data) = ResponseHeader::parse(&response).unwrap();
        assert_eq!(header.status.get(), 0);
        assert_eq!(BoardInfo::parse(data).unwrap().name, "RadarBaseboardMCU7");
        assert!(board.take_response().is_none());
    }

    #[test]
    fn test_write_reassembles_chunks() {
        let mut board = MockBoard::new_default();
        let address = ComponentKind::RadarAvian.address(0, SubInterface::Registers);
        // write burst at 0x10: two values split over two chunks
        let payload = [0x10, 1, 0, 0, 0, 2, 0, 0, 0];
        board
            .handle_request(&request(RequestKind::Write, true, &address, FN_REG_WRITE_BURST, &payload[..4]))
            .unwrap();
        assert!(board.executed().is_empty());
        board
            .handle_request(&request(RequestKind::Write, false, &address, FN_REG_WRITE_BURST, &payload[4..]))
            .unwrap();

        assert_eq!(board.executed().len(), 1);
        assert_eq!(board.executed()[0].payload, payload);
        assert_eq!(board.register(ComponentKind::RadarAvian, 0, 0x10), 1);
        assert_eq!(board.register(ComponentKind::RadarAvian, 0, 0x11), 2);
        assert!(board.take_response().is_none());
    }

    #[test]
    fn test_start_chunk_drops_partial_command() {
        let mut board = MockBoard::new_default();
        let address = ComponentKind::RadarAvian.address(0, SubInterface::Registers);
        let first = request(RequestKind::Write, true, &address, FN_REG_WRITE_BURST, &[0x10, 9, 9]);
        board.handle_request(&first).unwrap();

        // the rest never came; a new command starts over
        let mut fresh = Vec::new();
        let payload = [0x20, 7, 0, 0, 0];
        let header = RequestHeader::new(RequestKind::Write, false, &address, FN_REG_WRITE_BURST, 5)
            .with_start();
        encode_request(&header, &payload, &mut fresh);
        board.handle_request(&fresh).unwrap();

        assert_eq!(board.executed().len(), 1);
        assert_eq!(board.executed()[0].payload, payload);
        assert_eq!(board.register(ComponentKind::RadarAvian, 0, 0x20), 7);
    }

    #[test]
    fn test_send_failure_countdown() {
        let mut board = MockBoard::new_default();
        board.fail_send_after(2);
        assert!(!board.take_send_failure());
        assert!(!board.take_send_failure());
        assert!(board.take_send_failure());
        assert!(!board.take_send_failure());
    }

    #[test]
    fn test_missing_instance_reports_no_component() {
        let mut board = MockBoard::new_default();
        let address = ComponentKind::RadarAvian.address(3, SubInterface::Pins);
        board
            .handle_request(&read(&address, FN_PINS_GET_IRQ, 1, false))
            .unwrap();
        let response = board.take_response().unwrap();
        let (header, _) = ResponseHeader::parse(&response).unwrap();
        assert_eq!(header.status.get(), wire::STATUS_NO_COMPONENT);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let mut board = MockBoard::new_default();
        assert!(board.handle_request(&[0x02, 0x01]).is_err());
        assert!(board.handle_request(&[0x0F, 0, 0, 0, 0, 1, 0, 0]).is_err());
        assert_eq!(board.transfers().len(), 2);
    }

    #[test]
    fn test_stalled_board_swallows_reads() {
        let mut board = MockBoard::new_default();
        board.set_stalled(true);
        board
            .handle_request(&read(&ComponentAddress::BOARD, FN_VERSION_INFO, 8, false))
            .unwrap();
        assert!(board.take_response().is_none());
        assert_eq!(board.execution_count(ComponentAddress::BOARD, FN_VERSION_INFO), 1);
    }

    #[test]
    fn test_memory_bounds() {
        let mut board = MockBoard::new_default();
        let address = ComponentKind::MemoryFlash.address(0, SubInterface::Default);
        let mut payload = 4090u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0u8; 16]);
        board
            .handle_request(&request(RequestKind::Transfer, false, &address, FN_MEMORY_WRITE, &payload))
            .unwrap();
        board
            .handle_request(&read(&address, FN_MEMORY_WRITE, 0, false))
            .unwrap();
        let response = board.take_response().unwrap();
        let (header, _) = ResponseHeader::parse(&response).unwrap();
        assert_eq!(header.status.get(), wire::STATUS_BAD_PAYLOAD);
    }
}
