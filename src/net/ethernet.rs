use crate::net::errors::HeaderError;
use std::fmt;

/// A 48-bit Ethernet (hardware) address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EthernetAddress(pub [u8; 6]);

impl EthernetAddress {
    pub const BROADCAST: EthernetAddress = EthernetAddress([0xff; 6]);

    /// A random, locally administered unicast address
    pub fn random() -> Self {
        let mut octets: [u8; 6] = rand::random();
        octets[0] = (octets[0] | 0x02) & 0xfe;
        EthernetAddress(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: EthernetAddress,
    pub src: EthernetAddress,
    pub ether_type: u16,
}

impl EthernetHeader {
    pub const LENGTH: usize = 14;
    pub const TYPE_IPV4: u16 = 0x0800;
    pub const TYPE_ARP: u16 = 0x0806;

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut buf = [0u8; Self::LENGTH];
        buf[0..6].copy_from_slice(&self.dst.0);
        buf[6..12].copy_from_slice(&self.src.0);
        buf[12..14].copy_from_slice(&self.ether_type.to_be_bytes());
        buf
    }

    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, HeaderError> {
        if buf.len() < Self::LENGTH {
            return Err(HeaderError::BufferTooSmall { expected: Self::LENGTH, found: buf.len() });
        }
        buf[..Self::LENGTH].copy_from_slice(&self.to_bytes());
        Ok(Self::LENGTH)
    }

    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < Self::LENGTH {
            return Err(HeaderError::BufferTooSmall { expected: Self::LENGTH, found: buf.len() });
        }

        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&buf[0..6]);
        src.copy_from_slice(&buf[6..12]);

        Ok(EthernetHeader {
            dst: EthernetAddress(dst),
            src: EthernetAddress(src),
            ether_type: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }
}

/// An Ethernet header and its serialized payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub header: EthernetHeader,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn new(src: EthernetAddress, dst: EthernetAddress, ether_type: u16, payload: Vec<u8>) -> Self {
        EthernetFrame {
            header: EthernetHeader { dst, src, ether_type },
            payload,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(EthernetHeader::LENGTH + self.payload.len());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        let header = EthernetHeader::parse(buf)?;
        Ok(EthernetFrame {
            header,
            payload: buf[EthernetHeader::LENGTH..].to_vec(),
        })
    }
}

// -- Unit tests --
