use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use crate::config::{ARP_CACHE_TIMEOUT_MS, ARP_DEBOUNCE_TIMEOUT_MS};
use crate::net::arp::ArpMessage;
use crate::net::ethernet::{EthernetAddress, EthernetFrame, EthernetHeader};
use crate::net::ip_header::InternetDatagram;

/// A learned IP-to-Ethernet mapping
#[derive(Debug, Clone, Copy)]
struct ArpEntry {
    ethernet_address: EthernetAddress,
    learned_at: u64,
}

/// Connects the IP layer to an Ethernet link.
///
/// Outbound datagrams are framed for the next hop's hardware address, which
/// is resolved with ARP and cached for [`ARP_CACHE_TIMEOUT_MS`]. Datagrams to
/// an unresolved next hop wait until the reply arrives. The clock only moves
/// through [`NetworkInterface::tick`].
#[derive(Debug)]
pub struct NetworkInterface {
    name: String,
    ethernet_address: EthernetAddress,
    ip_address: Ipv4Addr,

    clock: u64,
    arp_cache: HashMap<Ipv4Addr, ArpEntry>,
    arp_requests: HashMap<Ipv4Addr, u64>, // When we last asked for each IP
    waiting: HashMap<Ipv4Addr, VecDeque<InternetDatagram>>,

    frames_out: VecDeque<EthernetFrame>,
    datagrams_in: VecDeque<InternetDatagram>,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, ethernet_address: EthernetAddress, ip_address: Ipv4Addr) -> Self {
        let name = name.into();
        log::debug!(
            "network interface {} has Ethernet address {} and IP address {}",
            name,
            ethernet_address,
            ip_address
        );

        NetworkInterface {
            name,
            ethernet_address,
            ip_address,
            clock: 0,
            arp_cache: HashMap::new(),
            arp_requests: HashMap::new(),
            waiting: HashMap::new(),
            frames_out: VecDeque::new(),
            datagrams_in: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ethernet_address(&self) -> EthernetAddress {
        self.ethernet_address
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.ip_address
    }

    /// Frame `dgram` for `next_hop`, resolving its hardware address first if needed
    pub fn send_datagram(&mut self, dgram: &InternetDatagram, next_hop: Ipv4Addr) {
        if let Some(entry) = self.arp_cache.get(&next_hop) {
            if self.clock - entry.learned_at >= ARP_CACHE_TIMEOUT_MS {
                log::debug!("{}: ARP entry for {} expired", self.name, next_hop);
                self.arp_cache.remove(&next_hop);
            }
        }

        if let Some(entry) = self.arp_cache.get(&next_hop) {
            let frame = EthernetFrame::new(
                self.ethernet_address,
                entry.ethernet_address,
                EthernetHeader::TYPE_IPV4,
                dgram.serialize(),
            );
            self.frames_out.push_back(frame);
            return;
        }

        if let Some(&asked_at) = self.arp_requests.get(&next_hop) {
            if self.clock - asked_at < ARP_DEBOUNCE_TIMEOUT_MS {
                log::debug!(
                    "{}: dropping datagram to {}, ARP request already in flight",
                    self.name,
                    next_hop
                );
                return;
            }
        }

        self.waiting.entry(next_hop).or_default().push_back(dgram.clone());

        log::debug!("{}: who has {}? tell {}", self.name, next_hop, self.ip_address);
        let request = ArpMessage::request(self.ethernet_address, self.ip_address, next_hop);
        self.frames_out.push_back(EthernetFrame::new(
            self.ethernet_address,
            EthernetAddress::BROADCAST,
            EthernetHeader::TYPE_ARP,
            request.serialize(),
        ));
        self.arp_requests.insert(next_hop, self.clock);
    }

    /// Handle an inbound frame. Returns the datagram it carried, if it was an
    /// IPv4 frame for this interface.
    pub fn recv_frame(&mut self, frame: &EthernetFrame) -> Option<InternetDatagram> {
        match frame.header.ether_type {
            EthernetHeader::TYPE_IPV4 => {
                if frame.header.dst != self.ethernet_address {
                    log::trace!("{}: ignoring IPv4 frame for {}", self.name, frame.header.dst);
                    return None;
                }
                match InternetDatagram::parse(&frame.payload) {
                    Ok(dgram) => Some(dgram),
                    Err(e) => {
                        log::debug!("{}: dropping malformed datagram: {}", self.name, e);
                        None
                    }
                }
            }
            EthernetHeader::TYPE_ARP => {
                match ArpMessage::parse(&frame.payload) {
                    Ok(msg) => self.recv_arp(&msg, frame.header.src),
                    Err(e) => log::debug!("{}: dropping malformed ARP message: {}", self.name, e),
                }
                None
            }
            other => {
                log::trace!("{}: ignoring frame of type {:#06x}", self.name, other);
                None
            }
        }
    }

    /// Like [`NetworkInterface::recv_frame`], but queues the datagram for
    /// [`NetworkInterface::maybe_receive`]
    pub fn recv_frame_queued(&mut self, frame: &EthernetFrame) {
        if let Some(dgram) = self.recv_frame(frame) {
            self.datagrams_in.push_back(dgram);
        }
    }

    /// Advance the clock used for cache aging and ARP debouncing
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.clock = self.clock.saturating_add(ms_since_last_tick);

        let clock = self.clock;
        self.arp_cache
            .retain(|_, entry| clock - entry.learned_at < ARP_CACHE_TIMEOUT_MS);
        self.arp_requests
            .retain(|_, asked_at| clock - *asked_at < ARP_DEBOUNCE_TIMEOUT_MS);
    }

    /// The next frame to put on the link, if any
    pub fn maybe_send(&mut self) -> Option<EthernetFrame> {
        self.frames_out.pop_front()
    }

    /// The next datagram queued by [`NetworkInterface::recv_frame_queued`]
    pub fn maybe_receive(&mut self) -> Option<InternetDatagram> {
        self.datagrams_in.pop_front()
    }

    fn recv_arp(&mut self, msg: &ArpMessage, frame_src: EthernetAddress) {
        match msg.opcode {
            ArpMessage::OPCODE_REPLY if msg.target_ethernet_address == self.ethernet_address => {
                self.learn(msg.sender_ip_address, msg.sender_ethernet_address);
            }
            ArpMessage::OPCODE_REQUEST if msg.target_ip_address == self.ip_address => {
                self.learn(msg.sender_ip_address, msg.sender_ethernet_address);

                log::debug!("{}: {} is at {}", self.name, self.ip_address, self.ethernet_address);
                let reply = ArpMessage::reply(
                    self.ethernet_address,
                    self.ip_address,
                    frame_src,
                    msg.sender_ip_address,
                );
                self.frames_out.push_back(EthernetFrame::new(
                    self.ethernet_address,
                    frame_src,
                    EthernetHeader::TYPE_ARP,
                    reply.serialize(),
                ));
            }
            _ => {}
        }
    }

    /// Cache a mapping and release every datagram that was waiting on it
    fn learn(&mut self, ip_address: Ipv4Addr, ethernet_address: EthernetAddress) {
        log::debug!("{}: learned {} is at {}", self.name, ip_address, ethernet_address);
        self.arp_cache.insert(
            ip_address,
            ArpEntry {
                ethernet_address,
                learned_at: self.clock,
            },
        );
        self.arp_requests.remove(&ip_address);

        for dgram in self.waiting.remove(&ip_address).unwrap_or_default() {
            self.frames_out.push_back(EthernetFrame::new(
                self.ethernet_address,
                ethernet_address,
                EthernetHeader::TYPE_IPV4,
                dgram.serialize(),
            ));
        }
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ip_header::Ipv4Header;

    const LOCAL_MAC: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 1]);
    const PEER_MAC: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 2]);
    const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const PEER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    fn iface() -> NetworkInterface {
        NetworkInterface::new("eth0", LOCAL_MAC, LOCAL_IP)
    }

    fn datagram(payload: &[u8]) -> InternetDatagram {
        InternetDatagram::new(LOCAL_IP, Ipv4Addr::new(1, 2, 3, 4), Ipv4Header::PROTO_TCP, payload.to_vec())
            .unwrap()
    }

    fn arp_reply_frame() -> EthernetFrame {
        let reply = ArpMessage::reply(PEER_MAC, PEER_IP, LOCAL_MAC, LOCAL_IP);
        EthernetFrame::new(PEER_MAC, LOCAL_MAC, EthernetHeader::TYPE_ARP, reply.serialize())
    }

    fn drain(iface: &mut NetworkInterface) -> Vec<EthernetFrame> {
        std::iter::from_fn(|| iface.maybe_send()).collect()
    }

    fn expect_arp_request(frame: &EthernetFrame, target: Ipv4Addr) {
        assert_eq!(frame.header.dst, EthernetAddress::BROADCAST);
        assert_eq!(frame.header.src, LOCAL_MAC);
        assert_eq!(frame.header.ether_type, EthernetHeader::TYPE_ARP);
        let msg = ArpMessage::parse(&frame.payload).unwrap();
        assert_eq!(msg, ArpMessage::request(LOCAL_MAC, LOCAL_IP, target));
    }

    fn expect_ipv4_to(frame: &EthernetFrame, dst: EthernetAddress, dgram: &InternetDatagram) {
        assert_eq!(frame.header.dst, dst);
        assert_eq!(frame.header.src, LOCAL_MAC);
        assert_eq!(frame.header.ether_type, EthernetHeader::TYPE_IPV4);
        assert_eq!(&InternetDatagram::parse(&frame.payload).unwrap(), dgram);
    }

    #[test]
    fn test_unresolved_next_hop_sends_one_arp_request() {
        let mut iface = iface();
        iface.send_datagram(&datagram(b"one"), PEER_IP);

        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 1);
        expect_arp_request(&frames[0], PEER_IP);
    }

    #[test]
    fn test_arp_requests_are_debounced() {
        let mut iface = iface();
        iface.send_datagram(&datagram(b"one"), PEER_IP);
        drain(&mut iface);

        iface.tick(ARP_DEBOUNCE_TIMEOUT_MS - 1);
        iface.send_datagram(&datagram(b"two"), PEER_IP);
        assert!(iface.maybe_send().is_none());

        iface.tick(1);
        iface.send_datagram(&datagram(b"three"), PEER_IP);
        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 1);
        expect_arp_request(&frames[0], PEER_IP);
    }

    #[test]
    fn test_arp_reply_flushes_queue_in_order() {
        let mut iface = iface();
        let first = datagram(b"one");
        let second = datagram(b"three");

        iface.send_datagram(&first, PEER_IP);
        iface.tick(ARP_DEBOUNCE_TIMEOUT_MS);
        iface.send_datagram(&second, PEER_IP);
        assert_eq!(drain(&mut iface).len(), 2);

        assert!(iface.recv_frame(&arp_reply_frame()).is_none());
        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 2);
        expect_ipv4_to(&frames[0], PEER_MAC, &first);
        expect_ipv4_to(&frames[1], PEER_MAC, &second);
    }

    #[test]
    fn test_cached_mapping_sends_directly() {
        let mut iface = iface();
        iface.recv_frame(&arp_reply_frame());

        let dgram = datagram(b"hello");
        iface.send_datagram(&dgram, PEER_IP);
        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 1);
        expect_ipv4_to(&frames[0], PEER_MAC, &dgram);
    }

    #[test]
    fn test_cache_entry_expires() {
        let mut iface = iface();
        iface.recv_frame(&arp_reply_frame());

        iface.tick(ARP_CACHE_TIMEOUT_MS - 1);
        iface.send_datagram(&datagram(b"fresh"), PEER_IP);
        assert_eq!(drain(&mut iface)[0].header.ether_type, EthernetHeader::TYPE_IPV4);

        iface.tick(1);
        iface.send_datagram(&datagram(b"stale"), PEER_IP);
        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 1);
        expect_arp_request(&frames[0], PEER_IP);
    }

    #[test]
    fn test_arp_request_for_us_is_answered_and_learned() {
        let mut iface = iface();
        let request = ArpMessage::request(PEER_MAC, PEER_IP, LOCAL_IP);
        let frame = EthernetFrame::new(
            PEER_MAC,
            EthernetAddress::BROADCAST,
            EthernetHeader::TYPE_ARP,
            request.serialize(),
        );
        assert!(iface.recv_frame(&frame).is_none());

        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.dst, PEER_MAC);
        let reply = ArpMessage::parse(&frames[0].payload).unwrap();
        assert_eq!(reply, ArpMessage::reply(LOCAL_MAC, LOCAL_IP, PEER_MAC, PEER_IP));

        // The requester's mapping was learned, so no ARP is needed
        iface.send_datagram(&datagram(b"x"), PEER_IP);
        assert_eq!(drain(&mut iface)[0].header.ether_type, EthernetHeader::TYPE_IPV4);
    }

    #[test]
    fn test_arp_request_for_someone_else_is_ignored() {
        let mut iface = iface();
        let request = ArpMessage::request(PEER_MAC, PEER_IP, Ipv4Addr::new(10, 0, 0, 99));
        let frame = EthernetFrame::new(
            PEER_MAC,
            EthernetAddress::BROADCAST,
            EthernetHeader::TYPE_ARP,
            request.serialize(),
        );
        iface.recv_frame(&frame);
        assert!(iface.maybe_send().is_none());
    }

    #[test]
    fn test_recv_ipv4_for_us() {
        let mut iface = iface();
        let dgram = datagram(b"inbound");
        let frame = EthernetFrame::new(PEER_MAC, LOCAL_MAC, EthernetHeader::TYPE_IPV4, dgram.serialize());
        assert_eq!(iface.recv_frame(&frame), Some(dgram.clone()));

        iface.recv_frame_queued(&frame);
        assert_eq!(iface.maybe_receive(), Some(dgram));
        assert_eq!(iface.maybe_receive(), None);
    }

    #[test]
    fn test_recv_ipv4_for_someone_else_is_dropped() {
        let mut iface = iface();
        let frame = EthernetFrame::new(
            PEER_MAC,
            EthernetAddress([0x02, 0, 0, 0, 0, 3]),
            EthernetHeader::TYPE_IPV4,
            datagram(b"x").serialize(),
        );
        assert!(iface.recv_frame(&frame).is_none());
    }

    #[test]
    fn test_malformed_and_unknown_frames_are_dropped() {
        let mut iface = iface();
        let garbage = EthernetFrame::new(PEER_MAC, LOCAL_MAC, EthernetHeader::TYPE_IPV4, vec![1, 2, 3]);
        assert!(iface.recv_frame(&garbage).is_none());

        let ipv6 = EthernetFrame::new(PEER_MAC, LOCAL_MAC, 0x86dd, vec![0u8; 40]);
        assert!(iface.recv_frame(&ipv6).is_none());
        assert!(iface.maybe_send().is_none());
    }

    #[test]
    fn test_clock_saturates() {
        let mut iface = iface();
        iface.recv_frame(&arp_reply_frame());

        iface.tick(u64::MAX);
        iface.tick(1);

        // The mapping aged out and a new request goes out without panicking
        iface.send_datagram(&datagram(b"late"), PEER_IP);
        let frames = drain(&mut iface);
        assert_eq!(frames.len(), 1);
        expect_arp_request(&frames[0], PEER_IP);

        // The clock is stuck at its maximum, so the request stays debounced
        iface.tick(ARP_DEBOUNCE_TIMEOUT_MS);
        iface.send_datagram(&datagram(b"later"), PEER_IP);
        assert!(iface.maybe_send().is_none());
    }
}
