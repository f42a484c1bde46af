//! Board discovery by UDP broadcast
//!
//! A board-info read is sent to every target (usually subnet broadcast
//! addresses). Every board that hears it answers from its control port
//! with its identity; answers are collected until the window closes.

use crate::link::bind_for;
use crate::UdpConnector;
use radarlink_core::board::{
    BoardDatabase, BoardDescriptor, BoardFilter, Boards, Connector, Enumerator, TransportFamily,
    TransportId,
};
use radarlink_core::bridge::BoardInfo;
use radarlink_core::component::ComponentAddress;
use radarlink_core::vendor::functions::{BOARD_INFO_LEN, FN_BOARD_INFO};
use radarlink_core::vendor::wire::{self, RequestHeader, RequestKind, ResponseHeader};
use radarlink_core::{LinkError, ProtocolError, Result};
use std::collections::HashSet;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default discovery targets: link-local broadcast on the board subnets
pub const DEFAULT_TARGETS: [&str; 2] = ["169.254.255.255:55055", "169.254.1.255:55055"];

/// Default time to wait for answers
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(200);

/// Enumerator probing UDP targets for boards
pub struct UdpEnumerator {
    targets: Vec<SocketAddr>,
    window: Duration,
    db: BoardDatabase,
    connector: Arc<UdpConnector>,
}

impl UdpEnumerator {
    /// Query the default targets, naming boards from `db`
    pub fn new(db: BoardDatabase) -> Self {
        Self {
            targets: DEFAULT_TARGETS
                .iter()
                .filter_map(|t| t.parse().ok())
                .collect(),
            window: DEFAULT_WINDOW,
            db,
            connector: Arc::new(UdpConnector::default()),
        }
    }

    /// Query `targets` instead of the defaults
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Collect answers for `window`
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Connector used by the reported descriptors
    pub fn with_connector(mut self, connector: UdpConnector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    fn send_queries(&self) -> io::Result<UdpSocket> {
        let family = self.targets.first().copied().unwrap_or_else(|| {
            SocketAddr::from(([0, 0, 0, 0], 0))
        });
        let socket = bind_for(&family)?;
        socket.set_broadcast(true)?;

        let header = RequestHeader::new(
            RequestKind::Read,
            false,
            &ComponentAddress::BOARD,
            FN_BOARD_INFO,
            BOARD_INFO_LEN as u16,
        )
        .with_start();
        let mut query = Vec::new();
        wire::encode_request(&header, &[], &mut query);

        for target in &self.targets {
            match socket.send_to(&query, target) {
                Ok(_) => log::debug!("board info query sent to {}", target),
                Err(e) => log::warn!("board info query to {} failed: {}", target, e),
            }
        }
        Ok(socket)
    }
}

impl Enumerator for UdpEnumerator {
    fn family(&self) -> TransportFamily {
        TransportFamily::Udp
    }

    fn enumerate(&self, filter: &BoardFilter) -> Result<Boards<'_>> {
        let socket = self.send_queries().map_err(|e| {
            log::warn!("cannot open discovery socket: {}", e);
            LinkError::Unavailable
        })?;
        log::info!(
            "probing {} target(s) for {} ms",
            self.targets.len(),
            self.window.as_millis()
        );
        Ok(Box::new(Discovery {
            socket,
            deadline: Instant::now() + self.window,
            seen: HashSet::new(),
            filter: filter.clone(),
            db: &self.db,
            connector: self.connector.clone(),
            buf: vec![0u8; wire::RESPONSE_HEADER_LEN + BOARD_INFO_LEN + 64],
        }))
    }
}

/// Answers to one query round, in arrival order
struct Discovery<'a> {
    socket: UdpSocket,
    deadline: Instant,
    seen: HashSet<SocketAddr>,
    filter: BoardFilter,
    db: &'a BoardDatabase,
    connector: Arc<UdpConnector>,
    buf: Vec<u8>,
}

impl Discovery<'_> {
    fn receive(&mut self) -> Option<(SocketAddr, usize)> {
        loop {
            let remaining = self.deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() || self.socket.set_read_timeout(Some(remaining)).is_err() {
                return None;
            }
            match self.socket.recv_from(&mut self.buf) {
                Ok((n, source)) => return Some((source, n)),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return None
                }
                // ICMP errors from earlier queries surface here; keep listening
                Err(e) => log::debug!("discovery socket: {}", e),
            }
        }
    }
}

fn parse_answer(bytes: &[u8]) -> core::result::Result<BoardInfo, ProtocolError> {
    let (header, data) = ResponseHeader::parse(bytes)?;
    if RequestKind::from_code(header.request)? != RequestKind::Read {
        return Err(ProtocolError::Malformed("not a read response"));
    }
    if header.status.get() != wire::STATUS_OK {
        return Err(ProtocolError::DeviceRejected(header.status.get()));
    }
    let length = (header.length.get() as usize).min(data.len());
    BoardInfo::parse(&data[..length])
}

impl Iterator for Discovery<'_> {
    type Item = BoardDescriptor;

    fn next(&mut self) -> Option<BoardDescriptor> {
        loop {
            let (source, n) = self.receive()?;
            let info = match parse_answer(&self.buf[..n]) {
                Ok(info) => info,
                Err(e) => {
                    log::warn!("ignoring discovery answer from {}: {}", source, e);
                    continue;
                }
            };
            if !self.seen.insert(source) {
                continue;
            }
            let name = self
                .db
                .find_by_id(info.vid, info.pid)
                .map_or(info.name, |entry| entry.name.clone());
            if !self.filter.matches(&name, info.vid, info.pid) {
                log::debug!("{} at {} filtered out", name, source);
                continue;
            }
            log::info!("found {} [{:04x}:{:04x}] at {}", name, info.vid, info.pid, source);
            let connector: Arc<dyn Connector> = self.connector.clone();
            return Some(BoardDescriptor::new(
                name,
                info.vid,
                info.pid,
                TransportId::Udp(source),
                connector,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarlink_core::bridge::{Bridge, ProtocolBridge};
    use radarlink_mock::{shared, MockBoard, MockConfig, MockUdpBoard};

    fn board(pid: u16, name: &str) -> MockBoard {
        MockBoard::new(MockConfig {
            info: BoardInfo {
                vid: 0x058B,
                pid,
                name: name.into(),
            },
            ..MockConfig::default()
        })
    }

    #[test]
    fn test_discovers_responders_in_arrival_order() {
        let a = MockUdpBoard::spawn(shared(board(0x0251, "board a"))).unwrap();
        let b = MockUdpBoard::spawn_with_delay(
            shared(board(0x7777, "Lab Prototype")),
            Duration::from_millis(60),
        )
        .unwrap();
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();

        // A is queried twice and answers twice; it is reported once
        let enumerator = UdpEnumerator::new(BoardDatabase::builtin())
            .with_targets([
                b.address(),
                a.address(),
                silent.local_addr().unwrap(),
                a.address(),
            ])
            .with_window(Duration::from_millis(400));

        let found: Vec<_> = enumerator.enumerate(&BoardFilter::any()).unwrap().collect();
        assert_eq!(found.len(), 2);

        // known ids are named from the database, unknown ones keep their name
        assert_eq!(found[0].name(), "RadarBaseboardMCU7");
        assert_eq!(found[0].id(), &TransportId::Udp(a.address()));
        assert_eq!(found[1].name(), "Lab Prototype");
        assert_eq!(found[1].pid(), 0x7777);
        assert_eq!(found[1].id(), &TransportId::Udp(b.address()));
    }

    #[test]
    fn test_filter_and_fresh_scans() {
        let a = MockUdpBoard::spawn(shared(board(0x0251, "a"))).unwrap();
        let b = MockUdpBoard::spawn(shared(board(0x0253, "b"))).unwrap();
        let enumerator = UdpEnumerator::new(BoardDatabase::builtin())
            .with_targets([a.address(), b.address()])
            .with_window(Duration::from_millis(200));

        let filter = BoardFilter::any().with_name("aurix");
        let found: Vec<_> = enumerator.enumerate(&filter).unwrap().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pid(), 0x0253);

        // every enumeration queries again
        let again: Vec<_> = enumerator.enumerate(&BoardFilter::any()).unwrap().collect();
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_nothing_answers() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let enumerator = UdpEnumerator::new(BoardDatabase::new())
            .with_targets([silent.local_addr().unwrap()])
            .with_window(Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(enumerator.enumerate(&BoardFilter::any()).unwrap().count(), 0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_descriptor_connects() {
        let mock = shared(board(0x0251, "x"));
        mock.lock()
            .set_register(radarlink_core::component::ComponentKind::RadarAvian, 0, 2, 0x1234);
        let served = MockUdpBoard::spawn(mock).unwrap();

        let enumerator = UdpEnumerator::new(BoardDatabase::builtin())
            .with_targets([served.address()])
            .with_window(Duration::from_millis(200));
        let descriptor = enumerator
            .enumerate(&BoardFilter::any())
            .unwrap()
            .next()
            .unwrap();

        let bridge = ProtocolBridge::new(descriptor.create_bridge().unwrap());
        bridge.open().unwrap();
        assert_eq!(bridge.board_info().unwrap().pid, 0x0251);
        assert_eq!(bridge.version_info().unwrap().major, 2);
        bridge.close();
        assert!(!bridge.is_connected());
    }
}
