use crate::net::errors::HeaderError;
use crate::net::ip_flags::IpFlags;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8, // Always 4 for IPv4
    pub ihl: u8,     // Always 5 since we have no options
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags: IpFlags,   // 3 bits, part of u16
    pub frag_offset: u16, // 13 bits, part of u16
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

impl Ipv4Header {
    pub const LENGTH: usize = 20;
    pub const DEFAULT_TTL: u8 = 64;
    pub const PROTO_TCP: u8 = 6;

    /// The 20 wire bytes of this header. The stored checksum is written as
    /// is; call [`Ipv4Header::compute_checksum`] after mutating.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut buf = [0u8; Self::LENGTH];

        buf[0] = (self.version << 4) | self.ihl;
        buf[1] = self.tos;
        buf[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        let flags = self.flags.pack(self.frag_offset);
        buf[6..8].copy_from_slice(&flags.to_be_bytes());
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        buf[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        buf[12..16].copy_from_slice(&self.src_ip.octets());
        buf[16..20].copy_from_slice(&self.dst_ip.octets());

        buf
    }

    /// Serialize into the first 20 bytes of `buf`.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, HeaderError> {
        if buf.len() < Self::LENGTH {
            return Err(HeaderError::BufferTooSmall { expected: Self::LENGTH, found: buf.len() });
        }
        buf[..Self::LENGTH].copy_from_slice(&self.to_bytes());
        Ok(Self::LENGTH)
    }

    /// Parse the first 20 bytes of `buf` into an `Ipv4Header`.
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < Self::LENGTH {
            return Err(HeaderError::BufferTooSmall { expected: Self::LENGTH, found: buf.len() });
        }

        let version = buf[0] >> 4;
        let ihl = buf[0] & 0x0f;
        if version != 4 {
            return Err(HeaderError::Unsupported(format!("IP version {version}")));
        }
        if ihl != 5 {
            return Err(HeaderError::Unsupported(format!("IPv4 header length {ihl}")));
        }

        if Self::checksum(&buf[..Self::LENGTH]) != 0 {
            return Err(HeaderError::BadChecksum("IP".to_string()));
        }

        let tos = buf[1];
        let total_len = u16::from_be_bytes([buf[2], buf[3]]);
        let id = u16::from_be_bytes([buf[4], buf[5]]);
        let combo_flags = u16::from_be_bytes([buf[6], buf[7]]);
        let (flags, frag_offset) = IpFlags::unpack(combo_flags);
        let ttl = buf[8];
        let protocol = buf[9];
        let checksum = u16::from_be_bytes([buf[10], buf[11]]);
        let src_ip = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
        let dst_ip = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);

        Ok(Ipv4Header {
            version,
            ihl,
            tos,
            total_len,
            id,
            flags,
            frag_offset,
            ttl,
            protocol,
            checksum,
            src_ip,
            dst_ip,
        })
    }

    /// Recompute the header checksum in place
    pub fn compute_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = Self::checksum(&self.to_bytes());
    }

    /// The Internet checksum of `data`.
    /// Wiki: https://en.wikipedia.org/wiki/IPv4_header_checksum.
    pub fn checksum(data: &[u8]) -> u16 {
        // Sum every 2 bytes as a 16-bit value, padding an odd tail with zero
        let mut sum: u32 = data
            .chunks(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], *chunk.get(1).unwrap_or(&0)]) as u32)
            .sum();

        // Fold the carry bits
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Ipv4Header {
            version: 4,
            ihl: 5,
            tos: 0,
            total_len: Self::LENGTH as u16,
            id: 0,
            flags: IpFlags::DF,
            frag_offset: 0,
            ttl: Self::DEFAULT_TTL,
            protocol: Self::PROTO_TCP,
            checksum: 0,
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// An IPv4 header and the payload it carries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternetDatagram {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl InternetDatagram {
    /// Largest payload whose total length still fits the 16-bit length field
    pub const MAX_PAYLOAD: usize = u16::MAX as usize - Ipv4Header::LENGTH;

    /// A datagram with a consistent length and checksum
    pub fn new(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, protocol: u8, payload: Vec<u8>) -> Result<Self, HeaderError> {
        let total_len = u16::try_from(Ipv4Header::LENGTH + payload.len())
            .map_err(|_| HeaderError::PayloadTooLarge { max: Self::MAX_PAYLOAD, found: payload.len() })?;

        let mut header = Ipv4Header {
            total_len,
            protocol,
            src_ip,
            dst_ip,
            ..Default::default()
        };
        header.compute_checksum();
        Ok(InternetDatagram { header, payload })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Ipv4Header::LENGTH + self.payload.len());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        let header = Ipv4Header::parse(buf)?;
        let total_len = header.total_len as usize;
        if total_len < Ipv4Header::LENGTH {
            return Err(HeaderError::Unsupported(format!("IPv4 total length {total_len}")));
        }
        if buf.len() < total_len {
            return Err(HeaderError::BufferTooSmall { expected: total_len, found: buf.len() });
        }

        Ok(InternetDatagram {
            payload: buf[Ipv4Header::LENGTH..total_len].to_vec(),
            header,
        })
    }
}

// -- Unit tests --
