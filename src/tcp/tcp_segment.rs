use std::net::Ipv4Addr;

use crate::net::errors::HeaderError;
use crate::net::ip_header::{InternetDatagram, Ipv4Header};
use crate::tcp::message::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::tcp_flags::TcpFlags;
use crate::tcp::tcp_header::TcpHeader;
use crate::tcp::wrap32::Wrap32;

/// Both halves of a TCP peer's output, as carried by one segment on the wire.
///
/// The sender half supplies the sequence number, SYN, FIN and payload; the
/// receiver half supplies ACK and the window. RST is carried through but has
/// no meaning to the sender or receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpSegment {
    pub src_port: u16,
    pub dst_port: u16,
    pub sender: TcpSenderMessage,
    pub receiver: TcpReceiverMessage,
    pub rst: bool,
}

impl TcpSegment {
    pub fn flags(&self) -> TcpFlags {
        let mut flags = TcpFlags::empty();
        flags.set(TcpFlags::SYN, self.sender.syn);
        flags.set(TcpFlags::FIN, self.sender.fin);
        flags.set(TcpFlags::ACK, self.receiver.ackno.is_some());
        flags.set(TcpFlags::RST, self.rst);
        flags.set(TcpFlags::PSH, !self.sender.payload.is_empty());
        flags
    }

    pub fn to_header(&self) -> TcpHeader {
        TcpHeader {
            src_port: self.src_port,
            dst_port: self.dst_port,
            seqno: self.sender.seqno,
            ackno: self.receiver.ackno.unwrap_or_default(),
            flags: self.flags(),
            window: self.receiver.window_size,
            payload: self.sender.payload.clone(),
            ..Default::default()
        }
    }

    pub fn from_header(tcph: TcpHeader) -> Self {
        TcpSegment {
            src_port: tcph.src_port,
            dst_port: tcph.dst_port,
            sender: TcpSenderMessage {
                seqno: tcph.seqno,
                syn: tcph.flags.contains(TcpFlags::SYN),
                payload: tcph.payload,
                fin: tcph.flags.contains(TcpFlags::FIN),
            },
            receiver: TcpReceiverMessage {
                ackno: tcph.flags.contains(TcpFlags::ACK).then_some(tcph.ackno),
                window_size: tcph.window,
            },
            rst: tcph.flags.contains(TcpFlags::RST),
        }
    }

    /// Wrap this segment in an IPv4 datagram from `src_ip` to `dst_ip`
    pub fn to_datagram(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Result<InternetDatagram, HeaderError> {
        let tcph = self.to_header();
        let iph = Ipv4Header {
            src_ip,
            dst_ip,
            protocol: Ipv4Header::PROTO_TCP,
            ..Default::default()
        };

        let mut payload = vec![0u8; tcph.header_len() + tcph.payload.len()];
        let n = tcph.serialize(&mut payload, &iph)?;
        payload.truncate(n);

        log::trace!(
            "{}:{} > {}:{} {} seq {} len {}",
            src_ip,
            self.src_port,
            dst_ip,
            self.dst_port,
            tcph.flags,
            tcph.seqno,
            tcph.payload.len()
        );
        InternetDatagram::new(src_ip, dst_ip, Ipv4Header::PROTO_TCP, payload)
    }

    /// Extract the segment carried by `dgram`, checking protocol and checksum
    pub fn from_datagram(dgram: &InternetDatagram) -> Result<Self, HeaderError> {
        if dgram.header.protocol != Ipv4Header::PROTO_TCP {
            return Err(HeaderError::Unsupported(format!("IP protocol {}", dgram.header.protocol)));
        }
        let tcph = TcpHeader::parse(&dgram.payload, &dgram.header)?;
        Ok(Self::from_header(tcph))
    }

    pub fn seqno(&self) -> Wrap32 {
        self.sender.seqno
    }
}

// -- Unit tests --
