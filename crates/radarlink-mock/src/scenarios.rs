//! End-to-end behaviour of the core stack against the emulated board

use crate::*;
use radarlink_core::bridge::{Connection, ProtocolBridge, VersionInfo};
use radarlink_core::component::{
    Component, ComponentAccess, ComponentAddress, ComponentKind, NamedError, RegisterMap,
    SubInterface,
};
use radarlink_core::frame::{OverflowPolicy, StreamConfig, StreamReceiver};
use radarlink_core::vendor::functions::*;
use radarlink_core::vendor::wire::{self, RequestHeader, RequestKind};
use radarlink_core::vendor::VendorCommands;
use radarlink_core::{Error, LinkError, ProtocolError};
use std::thread;
use std::time::Instant;

fn open_board(config: MockConfig) -> (SharedBoard, Arc<LinkBridge>) {
    let board = shared(MockBoard::new(config));
    let bridge = Arc::new(mock_bridge(&board));
    bridge.open().unwrap();
    (board, bridge)
}

fn avian(bridge: &LinkBridge) -> Component {
    Component::new(bridge.control().unwrap(), ComponentKind::RadarAvian, 0)
}

#[test]
fn test_chunks_arrive_in_order_and_reassemble() {
    let (board, bridge) = open_board(MockConfig::default());
    let address = ComponentKind::RadarAvian.address(0, SubInterface::Protocol);
    let commands = VendorCommands::new(bridge.control().unwrap(), address);

    let payload: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
    commands.write(FN_PROTOCOL_EXECUTE, &payload).unwrap();

    let board = board.lock();
    // 64 byte transfers carry 56 payload bytes each
    let transfers = board.transfers();
    assert_eq!(transfers.len(), 4);
    let mut reassembled = Vec::new();
    for (index, transfer) in transfers.iter().enumerate() {
        let (header, chunk) = RequestHeader::parse(transfer).unwrap();
        assert_eq!(header.kind(), Ok(RequestKind::Write));
        assert_eq!(header.more(), index < 3);
        assert_eq!(header.start(), index == 0);
        assert_eq!(header.function_id, FN_PROTOCOL_EXECUTE);
        assert_eq!(header.address_bytes(), address.to_wire());
        assert_eq!(header.length.get() as usize, chunk.len());
        reassembled.extend_from_slice(chunk);
    }
    assert_eq!(reassembled, payload);

    assert_eq!(board.executed().len(), 1);
    assert_eq!(board.executed()[0].payload, payload);
    assert_eq!(board.protocol_words().len(), 50);
}

#[test]
fn test_empty_write_sends_one_header() {
    let (board, bridge) = open_board(MockConfig::default());
    let radar = avian(&bridge);
    radar.pins().unwrap().reset().unwrap();

    let board = board.lock();
    assert_eq!(board.transfers().len(), 1);
    assert_eq!(board.transfers()[0].len(), wire::REQUEST_HEADER_LEN);
    assert_eq!(board.pins(ComponentKind::RadarAvian, 0).reset_pulses, 1);
}

#[test]
fn test_set_bits_boundaries() {
    let (board, bridge) = open_board(MockConfig::default());
    let radar = avian(&bridge);
    let protocol = radar.protocol().unwrap();
    let registers = radar.registers().unwrap();

    board
        .lock()
        .set_register(ComponentKind::RadarAvian, 0, 0x00, 0x0000_1000);

    protocol.set_bits(0x00, 0).unwrap();
    assert_eq!(registers.read(0x00).unwrap(), 0x0000_1000);

    protocol.set_bits(0xFF, 0x00FF_FFFF).unwrap();
    assert_eq!(registers.read(0xFF).unwrap(), 0x00FF_FFFF);

    // bits above the 24-bit mask never reach the device
    protocol.set_bits(0x12, 0xFF00_0001).unwrap();
    assert_eq!(registers.read(0x12).unwrap(), 0x0000_0001);

    let board = board.lock();
    let words = board.protocol_words();
    assert_eq!(words, &[0x0000_0000, 0xFFFF_FFFF, 0x1200_0001]);
}

#[test]
fn test_rejected_transfer_is_not_retried() {
    let (board, bridge) = open_board(MockConfig::default());
    let radar = avian(&bridge);
    let address = ComponentKind::RadarAvian.address(0, SubInterface::Registers);
    board
        .lock()
        .inject_status(address, FN_REG_READ_BURST, wire::STATUS_NOT_SUPPORTED);

    // large enough to need several burst commands
    let mut values = [0u32; 40];
    let err = radar
        .registers()
        .unwrap()
        .read_burst(0x00, &mut values)
        .unwrap_err();

    assert_eq!(err.protocol(), Some(ProtocolError::DeviceRejected(0x0002)));
    match &err {
        Error::Command {
            address: failed,
            function_id,
            ..
        } => {
            assert_eq!(*failed, address);
            assert_eq!(*function_id, FN_REG_READ_BURST);
        }
        other => panic!("missing command context: {other:?}"),
    }
    assert_eq!(board.lock().execution_count(address, FN_REG_READ_BURST), 1);

    // the firmware remembers the failure
    let info = ProtocolBridge::new(bridge.clone());
    assert_eq!(info.error_info().unwrap(), 0x0002);
}

#[test]
fn test_short_read() {
    let (_board, bridge) = open_board(MockConfig::default());
    let commands = VendorCommands::new(bridge.control().unwrap(), ComponentAddress::BOARD);
    let err = commands.read_vec(FN_BOARD_INFO, 40).unwrap_err();
    assert_eq!(
        err.protocol(),
        Some(ProtocolError::ShortRead {
            expected: 40,
            actual: 32
        })
    );
}

#[test]
fn test_link_too_small_for_any_payload() {
    let (board, bridge) = open_board(MockConfig {
        max_transfer: 8,
        ..MockConfig::default()
    });
    let radar = avian(&bridge);
    let err = radar.registers().unwrap().write(0x01, 1).unwrap_err();
    assert!(matches!(
        err.link(),
        Some(LinkError::PayloadTooLarge { max: 8, .. })
    ));
    assert!(board.lock().transfers().is_empty());
}

#[test]
fn test_close_unblocks_command_in_flight() {
    let board = shared(MockBoard::new_default());
    let bridge = Arc::new(mock_bridge_with_timeout(&board, Duration::from_secs(30)));
    bridge.open().unwrap();
    board.lock().set_stalled(true);

    let radar = avian(&bridge);
    let start = Instant::now();
    let worker = thread::spawn(move || radar.registers().unwrap().read(0x02));

    thread::sleep(Duration::from_millis(50));
    bridge.close();
    let result = worker.join().unwrap();

    assert_eq!(result.unwrap_err().link(), Some(LinkError::Closed));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!bridge.is_connected());

    // commands on a closed bridge fail without touching the board
    let sent = board.lock().transfers().len();
    assert!(avian(&bridge).registers().unwrap().read(0x02).is_err());
    assert_eq!(board.lock().transfers().len(), sent);

    // and the bridge can be reopened
    board.lock().set_stalled(false);
    board.lock().set_register(ComponentKind::RadarAvian, 0, 0x02, 0xBEEF);
    bridge.open().unwrap();
    assert_eq!(avian(&bridge).registers().unwrap().read(0x02).unwrap(), 0xBEEF);
}

#[test]
fn test_close_unblocks_send_in_flight() {
    let board = shared(MockBoard::new_default());
    let bridge = Arc::new(mock_bridge_with_timeout(&board, Duration::from_secs(30)));
    bridge.open().unwrap();
    board.lock().set_sends_stalled(true);

    let radar = avian(&bridge);
    let start = Instant::now();
    let worker = thread::spawn(move || radar.registers().unwrap().write(0x02, 1));

    thread::sleep(Duration::from_millis(50));
    bridge.close();
    let result = worker.join().unwrap();

    assert_eq!(result.unwrap_err().link(), Some(LinkError::Closed));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(board.lock().transfers().is_empty());
}

#[test]
fn test_lost_chunk_aborts_write() {
    let (board, bridge) = open_board(MockConfig::default());
    let address = ComponentKind::RadarAvian.address(0, SubInterface::Protocol);
    let commands = VendorCommands::new(bridge.control().unwrap(), address);

    // 200 bytes need four chunks; the second one is lost
    board.lock().fail_send_after(1);
    let err = commands.write(FN_PROTOCOL_EXECUTE, &[0xAA; 200]).unwrap_err();
    assert_eq!(err.link(), Some(LinkError::Timeout));
    {
        let board = board.lock();
        assert_eq!(board.transfers().len(), 1, "chunks after the lost one were sent");
        assert!(board.executed().is_empty());
    }

    // the next command to the same function carries only its own payload
    commands.write(FN_PROTOCOL_EXECUTE, &[0x55; 12]).unwrap();
    let board = board.lock();
    assert_eq!(board.transfers().len(), 2);
    assert_eq!(board.executed().len(), 1);
    assert_eq!(board.executed()[0].payload, [0x55; 12]);
    assert_eq!(board.protocol_words(), &[0x5555_5555; 3]);
}

#[test]
fn test_lost_chunk_aborts_read() {
    // 11 data bytes per answer: the 32 byte board info takes three reads
    let (board, bridge) = open_board(MockConfig {
        max_transfer: 16,
        ..MockConfig::default()
    });
    let commands = VendorCommands::new(bridge.control().unwrap(), ComponentAddress::BOARD);

    board.lock().fail_send_after(1);
    let err = commands.read_vec(FN_BOARD_INFO, BOARD_INFO_LEN).unwrap_err();
    assert_eq!(err.link(), Some(LinkError::Timeout));
    assert_eq!(board.lock().transfers().len(), 1);

    // a fresh read starts at the beginning of the answer
    let bytes = commands.read_vec(FN_BOARD_INFO, BOARD_INFO_LEN).unwrap();
    let info = radarlink_core::bridge::BoardInfo::parse(&bytes).unwrap();
    assert_eq!(info.name, "RadarBaseboardMCU7");
    assert_eq!(board.lock().transfers().len(), 4);
}

#[test]
fn test_commands_from_two_threads_never_interleave() {
    let (board, bridge) = open_board(MockConfig::default());
    let control = bridge.control().unwrap();

    let radar = {
        let radar = Component::new(control.clone(), ComponentKind::RadarAvian, 0);
        let protocol =
            VendorCommands::new(control.clone(), ComponentKind::RadarAvian.address(0, SubInterface::Protocol));
        thread::spawn(move || {
            let payload = [0u8; 200];
            let mut values = [0u32; 20];
            for _ in 0..10 {
                protocol.write(FN_PROTOCOL_EXECUTE, &payload).unwrap();
                radar.registers().unwrap().read_burst(0, &mut values).unwrap();
            }
        })
    };
    let pmic = {
        let pmic = Component::new(control.clone(), ComponentKind::PowerSupplyMax20430, 0);
        thread::spawn(move || {
            let registers = pmic.registers().unwrap();
            let values: Vec<u32> = (0..40).collect();
            let mut back = [0u32; 40];
            for round in 0..10 {
                registers.write_burst(round, &values).unwrap();
                registers.read_burst(round, &mut back).unwrap();
                assert_eq!(&back[..], &values[..]);
            }
        })
    };
    radar.join().unwrap();
    pmic.join().unwrap();

    // a chunk with MORE set and a transfer awaiting its read both keep the
    // channel: the next transfer must go to the same component
    let board = board.lock();
    let mut open: Option<[u8; 4]> = None;
    for transfer in board.transfers() {
        let (header, _) = RequestHeader::parse(transfer).unwrap();
        if let Some(expected) = open {
            assert_eq!(header.address_bytes(), expected, "chunks interleaved");
        }
        let awaiting_read = header.kind() == Ok(RequestKind::Transfer);
        open = (header.more() || awaiting_read).then(|| header.address_bytes());
    }
    assert_eq!(board.register(ComponentKind::PowerSupplyMax20430, 0, 9 + 39), 39);
}

#[test]
fn test_register_operations() {
    let (board, bridge) = open_board(MockConfig::default());
    let radar = avian(&bridge);
    let registers = radar.registers().unwrap();

    let values: Vec<u32> = (0..30).map(|i| 0x0100_0000 + i).collect();
    registers.write_burst(0x20, &values).unwrap();
    let mut back = vec![0u32; 30];
    registers.read_burst(0x20, &mut back).unwrap();
    assert_eq!(back, values);

    registers
        .write_batch(&[(0x01, 0xAAAA), (0x05, 0x5555), (0x7F, 0xFFFF_FFFF)])
        .unwrap();
    let mut batch = [0u32; 3];
    registers.read_batch(&[0x7F, 0x01, 0x05], &mut batch).unwrap();
    assert_eq!(batch, [0xFFFF_FFFF, 0xAAAA, 0x5555]);

    registers.set_bits(0x01, 0x0F00).unwrap();
    registers.clear_bits(0x01, 0x000A).unwrap();
    assert_eq!(board.lock().register(ComponentKind::RadarAvian, 0, 0x01), 0xAFA0);
    registers.modify_bits(0x01, 0xFFFF, 0x1234).unwrap();
    assert_eq!(registers.read(0x01).unwrap(), 0x1234);

    let mut short = [0u32; 2];
    assert!(registers.read_batch(&[1], &mut short).is_err());
}

#[test]
fn test_register_values_checked_against_width() {
    let (board, bridge) = open_board(MockConfig::default());
    let pmic = Component::new(
        bridge.control().unwrap(),
        ComponentKind::PowerSupplyMax20430,
        0,
    );
    let registers = pmic.registers().unwrap();
    assert_eq!(
        registers.write(0x00, 0x100).unwrap_err().protocol(),
        Some(ProtocolError::Malformed("register value wider than register"))
    );
    assert!(board.lock().transfers().is_empty());

    registers.write(0x00, 0xFF).unwrap();
    assert_eq!(registers.read(0x00).unwrap(), 0xFF);
}

#[test]
fn test_missing_component_instance() {
    let (_board, bridge) = open_board(MockConfig::default());
    let second = Component::new(bridge.control().unwrap(), ComponentKind::RadarAvian, 1);
    let err = second.registers().unwrap().read(0).unwrap_err();
    assert_eq!(
        err.protocol(),
        Some(ProtocolError::DeviceRejected(wire::STATUS_NO_COMPONENT))
    );
}

#[test]
fn test_pins() {
    let (board, bridge) = open_board(MockConfig::default());
    let radar = avian(&bridge);
    let pins = radar.pins().unwrap();

    pins.set_reset_pin(true).unwrap();
    assert!(board.lock().pins(ComponentKind::RadarAvian, 0).reset_asserted);
    pins.set_reset_pin(false).unwrap();
    assert!(!board.lock().pins(ComponentKind::RadarAvian, 0).reset_asserted);

    assert!(!pins.irq_pin().unwrap());
    {
        let mut board = board.lock();
        let state = board.pins_mut(ComponentKind::RadarAvian, 0);
        state.irq = true;
        state.detection = DETECTION_APPROACHING;
    }
    assert!(pins.irq_pin().unwrap());
    let detection = pins.detection_pins().unwrap();
    assert!(!detection.target_detected);
    assert!(detection.approaching);

    // reset clears the register file
    board
        .lock()
        .set_register(ComponentKind::RadarAvian, 0, 0x03, 7);
    pins.reset().unwrap();
    assert_eq!(radar.registers().unwrap().read(0x03).unwrap(), 0);
}

#[test]
fn test_protocol_execute_collects_results() {
    let (board, bridge) = open_board(MockConfig::default());
    let radar = avian(&bridge);
    let protocol = radar.protocol().unwrap();

    let write = |address: u32, data: u32| (address << 25) | (1 << 24) | data;
    let read = |address: u32| address << 25;

    // 20 words do not fit in one command
    let mut words = Vec::new();
    for address in 0..10 {
        words.push(write(address, 0x100 + address));
    }
    for address in 0..10 {
        words.push(read(address));
    }
    let mut results = vec![0u32; words.len()];
    protocol.execute(&words, Some(&mut results)).unwrap();

    for address in 0..10 {
        assert_eq!(results[address as usize], address << 25);
        assert_eq!(results[10 + address as usize], (address << 25) | (0x100 + address));
    }
    let executions = board.lock().execution_count(
        ComponentKind::RadarAvian.address(0, SubInterface::Protocol),
        FN_PROTOCOL_EXECUTE,
    );
    assert_eq!(executions, 2);

    let mut wrong = vec![0u32; 3];
    assert!(protocol.execute(&words, Some(&mut wrong)).is_err());
    protocol.execute(&words[..4], None).unwrap();
}

#[test]
fn test_memory() {
    let (board, bridge) = open_board(MockConfig::default());
    let flash = Component::new(bridge.control().unwrap(), ComponentKind::MemoryFlash, 0);
    let memory = flash.memory().unwrap();
    assert!(flash.registers().is_none());

    let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    memory.write(100, &data).unwrap();
    let mut back = vec![0u8; 300];
    memory.read(100, &mut back).unwrap();
    assert_eq!(back, data);

    memory.erase(100, 100).unwrap();
    assert!(board.lock().memory()[100..200].iter().all(|&b| b == 0xFF));
    assert_eq!(board.lock().memory()[200], data[100]);

    let err = memory.erase(4000, 200).unwrap_err();
    assert_eq!(
        err.protocol(),
        Some(ProtocolError::DeviceRejected(wire::STATUS_BAD_PAYLOAD))
    );
}

const AVIAN_MAP: &str = r#"(
    registers: [
        (
            name: "MAIN",
            address: 0x00,
            reset: 0x1C8270,
            fields: [
                (name: "FRAME_START", offset: 0, width: 1),
                (name: "LOAD_STRL_PERIODS", offset: 12, width: 4),
            ],
        ),
        (name: "ADC0", address: 0x01, reset: 0x0A0240),
        (name: "CHIP_ID", address: 0x02, fields: [(name: "DIGITAL_ID", offset: 8, width: 24)]),
    ],
)"#;

#[test]
fn test_named_registers() {
    let (board, bridge) = open_board(MockConfig::default());
    let map = Arc::new(RegisterMap::from_ron(AVIAN_MAP).unwrap());
    let named = avian(&bridge).named_registers(map).unwrap();

    named.write_reset_values().unwrap();
    assert_eq!(named.read("MAIN").unwrap(), 0x1C8270);
    assert_eq!(named.read("ADC0").unwrap(), 0x0A0240);

    // a field write leaves the rest of the register alone
    named.write("MAIN.LOAD_STRL_PERIODS", 0x3).unwrap();
    assert_eq!(board.lock().register(ComponentKind::RadarAvian, 0, 0x00), 0x1C3270);
    named.set_bits("MAIN.FRAME_START", 1).unwrap();
    assert_eq!(named.read("MAIN.FRAME_START").unwrap(), 1);
    named.clear_bits("MAIN", 0x1).unwrap();
    assert_eq!(named.read("MAIN.FRAME_START").unwrap(), 0);
    named.modify_bits("MAIN.LOAD_STRL_PERIODS", 0xF, 0x9).unwrap();
    assert_eq!(named.read("MAIN.LOAD_STRL_PERIODS").unwrap(), 0x9);

    board
        .lock()
        .set_register(ComponentKind::RadarAvian, 0, 0x02, 0x0123_4599);
    assert_eq!(
        named.read_many(&["CHIP_ID.DIGITAL_ID", "0x01", "MAIN"]).unwrap(),
        vec![0x01_2345, 0x0A0240, 0x1C9270]
    );

    named
        .write_many(&[("ADC0", 1), ("0x10", 2), ("MAIN.FRAME_START", 1), ("0x11", 3)])
        .unwrap();
    let mut values = [0u32; 2];
    named.read_burst("0x10", &mut values).unwrap();
    assert_eq!(values, [2, 3]);
    assert_eq!(named.read("ADC0").unwrap(), 1);
    assert_eq!(named.read("MAIN.FRAME_START").unwrap(), 1);

    let sent = board.lock().transfers().len();
    assert!(matches!(
        named.write("MAIN.FRAME_START", 2),
        Err(NamedError::ValueTooWide { .. })
    ));
    assert!(matches!(
        named.write_burst("MAIN.FRAME_START", &[1, 2]),
        Err(NamedError::FieldAccess(_))
    ));
    assert!(matches!(named.read("MISSING"), Err(NamedError::UnknownRegister(_))));
    assert_eq!(board.lock().transfers().len(), sent);
}

#[test]
fn test_named_register_device_errors_pass_through() {
    let (board, bridge) = open_board(MockConfig::default());
    let named = avian(&bridge)
        .named_registers(Arc::new(RegisterMap::new()))
        .unwrap();
    let address = ComponentKind::RadarAvian.address(0, SubInterface::Registers);
    board
        .lock()
        .inject_status(address, FN_REG_READ_BURST, wire::STATUS_BAD_PAYLOAD);

    match named.read("0x05") {
        Err(NamedError::Device(err)) => assert_eq!(
            err.protocol(),
            Some(ProtocolError::DeviceRejected(wire::STATUS_BAD_PAYLOAD))
        ),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_protocol_bridge_queries() {
    let (board, bridge) = open_board(MockConfig::default());
    let protocol = ProtocolBridge::new(bridge.clone());

    let info = protocol.board_info().unwrap();
    assert_eq!((info.vid, info.pid), (0x058B, 0x0251));
    assert_eq!(info.name, "RadarBaseboardMCU7");
    assert_eq!(protocol.version_info().unwrap().to_string(), "2.5.1.42");
    assert_eq!(&protocol.uuid().unwrap(), b"mock-board-00001");
    assert_eq!(protocol.error_info().unwrap(), 0);
    assert_eq!(protocol.max_transfer().unwrap(), 64);

    let min = VersionInfo {
        major: 2,
        minor: 0,
        patch: 0,
        build: 0,
    };
    assert!(protocol.check_version(min).is_ok());
    let too_new = VersionInfo { major: 3, ..min };
    let err = protocol.check_version(too_new).unwrap_err();
    assert_eq!(
        err.protocol(),
        Some(ProtocolError::FirmwareTooOld {
            required: too_new,
            found: protocol.version_info().unwrap(),
        })
    );
    assert_eq!(err.to_string(), "firmware 2.5.1.42 older than required 3.0.0.0");

    // connection state is the wrapped bridge's
    assert!(protocol.is_connected());
    protocol.close();
    assert!(!bridge.is_connected());
    assert!(board.lock().executed().len() >= 5);
}

#[test]
fn test_stream_frames_through_pool() {
    let (_board, bridge) = open_board(MockConfig::default());
    let source = bridge.data().unwrap().open_source(256).unwrap();
    let config = StreamConfig {
        frame_size: 256,
        frame_count: 4,
        overflow: OverflowPolicy::Block,
        claim_timeout: Duration::from_millis(10),
    };
    let stream = StreamReceiver::start(source, &config).unwrap();

    for expected in 0..100u32 {
        let frame = stream.next_frame(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.data_size(), 256);
        assert_eq!(check_frame(frame.data()), Some(expected));
        frame.release();
    }

    bridge.close();
    let mut drained = 0;
    let err = loop {
        match stream.next_frame(Duration::from_secs(5)) {
            Ok(frame) => {
                drained += 1;
                frame.release();
            }
            Err(e) => break e,
        }
    };
    assert!(drained <= config.frame_count);
    assert_eq!(err.link(), Some(LinkError::Closed));
    assert_eq!(stream.pool().outstanding(), 0);
}

#[test]
fn test_enumerate_and_connect() {
    let second = MockConfig {
        info: radarlink_core::bridge::BoardInfo {
            vid: 0x058B,
            pid: 0x0253,
            name: "RadarBaseboardAurix".into(),
        },
        ..MockConfig::default()
    };
    let enumerator = MockEnumerator::new(vec![
        shared(MockBoard::new_default()),
        shared(MockBoard::new(second)),
    ]);
    assert_eq!(enumerator.family(), TransportFamily::Mock);

    let all: Vec<_> = enumerator.enumerate(&BoardFilter::any()).unwrap().collect();
    assert_eq!(all.len(), 2);

    let filter = BoardFilter::any().with_ids([(0x058B, 0x0253)]);
    let found: Vec<_> = enumerator.enumerate(&filter).unwrap().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name(), "RadarBaseboardAurix");
    assert_eq!(found[0].id(), &TransportId::Mock("mock1".into()));

    // enumeration does not open anything; connecting does
    let bridge = found[0].create_bridge().unwrap();
    assert!(!bridge.is_connected());
    let connection = Connection::open(ProtocolBridge::new(bridge.clone())).unwrap();
    assert_eq!(connection.board_info().unwrap().pid, 0x0253);
    drop(connection);
    assert!(!bridge.is_connected());
}

#[test]
fn test_unavailable_board_fails_to_open() {
    let board = shared(MockBoard::new_default());
    board.lock().set_unavailable(true);
    let bridge = mock_bridge(&board);
    assert_eq!(bridge.open(), Err(LinkError::Unavailable));
    assert!(!bridge.is_connected());
}
