use netstack::config::TcpConfig;
use netstack::net::InternetDatagram;
use netstack::tcp::{ByteStream, Reassembler, TcpReceiver, TcpSegment, TcpSender, Wrap32};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::net::Ipv4Addr;

const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// One end of a connection: a sender and a receiver sharing ports and addresses
struct Peer {
    ip: Ipv4Addr,
    port: u16,
    peer_ip: Ipv4Addr,
    peer_port: u16,
    sender: TcpSender,
    outbound: ByteStream,
    receiver: TcpReceiver,
    reassembler: Reassembler,
    inbound: ByteStream,
    need_ack: bool,
}

impl Peer {
    fn new(ip: Ipv4Addr, port: u16, peer_ip: Ipv4Addr, peer_port: u16, isn: u32, capacity: usize) -> Self {
        let config = TcpConfig {
            capacity,
            fixed_isn: Some(Wrap32::new(isn)),
            ..Default::default()
        };
        Peer {
            ip,
            port,
            peer_ip,
            peer_port,
            sender: TcpSender::from_config(&config),
            outbound: ByteStream::new(config.capacity),
            receiver: TcpReceiver::new(),
            reassembler: Reassembler::new(),
            inbound: ByteStream::new(config.capacity),
            need_ack: false,
        }
    }

    /// Everything this peer wants to put on the wire right now
    fn datagrams_out(&mut self) -> Vec<InternetDatagram> {
        self.sender.push(&mut self.outbound.reader());
        let ack = self.receiver.send(&self.inbound.writer());

        let mut messages: Vec<_> = std::iter::from_fn(|| self.sender.maybe_send()).collect();
        if messages.is_empty() && self.need_ack {
            messages.push(self.sender.send_empty_message());
        }
        self.need_ack = false;

        messages
            .into_iter()
            .map(|sender| TcpSegment {
                src_port: self.port,
                dst_port: self.peer_port,
                sender,
                receiver: ack,
                rst: false,
            })
            .map(|seg| seg.to_datagram(self.ip, self.peer_ip).unwrap())
            .collect()
    }

    fn datagram_in(&mut self, dgram: &InternetDatagram) {
        let Ok(seg) = TcpSegment::from_datagram(dgram) else {
            return;
        };
        assert_eq!(seg.dst_port, self.port);

        self.sender.receive(&seg.receiver);
        if seg.sender.sequence_length() > 0 {
            self.receiver
                .receive(seg.sender, &mut self.reassembler, &mut self.inbound.writer());
            self.need_ack = true;
        }
    }

    fn tick(&mut self, ms: u64) {
        self.sender.tick(ms);
    }
}

/// Send `data` from client to server, letting `mangle` drop (None) or alter
/// each client datagram in flight. Returns what the server read.
fn transfer<F>(data: &[u8], capacity: usize, mut mangle: F) -> Vec<u8>
where
    F: FnMut(usize, Vec<u8>) -> Option<Vec<u8>>,
{
    let mut client = Peer::new(CLIENT_IP, 40000, SERVER_IP, 80, 0xfffff000, capacity);
    let mut server = Peer::new(SERVER_IP, 80, CLIENT_IP, 40000, 12345, capacity);

    let mut written = 0;
    let mut received = Vec::with_capacity(data.len());
    let mut sent_count = 0;

    for _ in 0..100_000 {
        // Application writes
        if written < data.len() {
            written += client.outbound.writer().push(&data[written..]);
        } else if !client.outbound.is_closed() {
            client.outbound.writer().close();
        }

        for dgram in client.datagrams_out() {
            sent_count += 1;
            let Some(bytes) = mangle(sent_count, dgram.serialize()) else {
                continue;
            };
            if let Ok(dgram) = InternetDatagram::parse(&bytes) {
                server.datagram_in(&dgram);
            }
        }

        // Application reads
        let mut reader = server.inbound.reader();
        received.extend_from_slice(reader.peek());
        let n = reader.bytes_buffered();
        reader.pop(n);
        if server.inbound.is_finished() {
            break;
        }

        for dgram in server.datagrams_out() {
            client.datagram_in(&InternetDatagram::parse(&dgram.serialize()).unwrap());
        }

        client.tick(100);
        server.tick(100);

        // The sender retries forever; giving up is the caller's decision
        for peer in [&client, &server] {
            assert!(
                peer.sender.consecutive_retransmissions() <= TcpConfig::MAX_RETX_ATTEMPTS,
                "too many consecutive retransmissions"
            );
        }
    }

    assert!(server.inbound.is_finished(), "stream never finished");
    received
}

fn random_data(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(144);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

#[test]
fn test_lossless_transfer() {
    let data = random_data(100_000);
    let received = transfer(&data, 4000, |_, bytes| Some(bytes));
    assert_eq!(received, data);
}

#[test]
fn test_transfer_with_loss() {
    let data = random_data(20_000);
    let received = transfer(&data, 3000, |n, bytes| if n % 7 == 3 { None } else { Some(bytes) });
    assert_eq!(received, data);
}

#[test]
fn test_transfer_with_corruption() {
    let data = random_data(20_000);
    let received = transfer(&data, 3000, |n, mut bytes| {
        if n % 5 == 2 {
            // Flip a payload bit; the IP header stays valid, the TCP checksum fails
            let last = bytes.len() - 1;
            bytes[last] ^= 0x40;
        }
        Some(bytes)
    });
    assert_eq!(received, data);
}

#[test]
fn test_empty_stream() {
    let received = transfer(&[], 1000, |_, bytes| Some(bytes));
    assert!(received.is_empty());
}
