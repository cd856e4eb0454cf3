use crate::net::errors::HeaderError;
use crate::net::ip_header::Ipv4Header;
use crate::tcp::tcp_flags::TcpFlags;
use crate::tcp::wrap32::Wrap32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seqno: Wrap32,
    pub ackno: Wrap32,
    pub data_offset: u8, // Upper 4 bits, in 32-bit words
    pub reserved: u8,    // Lower 4 bits
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent: u16,
    pub options: Vec<u8>,
    pub payload: Vec<u8>, // Carried along with the header for ease of use
}

impl Default for TcpHeader {
    fn default() -> Self {
        TcpHeader {
            src_port: 0,
            dst_port: 0,
            seqno: Wrap32::new(0),
            ackno: Wrap32::new(0),
            data_offset: 5,
            reserved: 0,
            flags: TcpFlags::empty(),
            window: 0,
            checksum: 0,
            urgent: 0,
            options: vec![],
            payload: vec![],
        }
    }
}

impl TcpHeader {
    pub const MIN_LENGTH: usize = 20;

    /// Length of the header including options
    pub fn header_len(&self) -> usize {
        self.data_offset as usize * 4
    }

    /// Write header and payload into `buf`, filling in the checksum computed
    /// over the pseudo-header taken from `iph`.
    pub fn serialize(&self, buf: &mut [u8], iph: &Ipv4Header) -> Result<usize, HeaderError> {
        let header_len = self.header_len();
        if header_len != Self::MIN_LENGTH + self.options.len() {
            return Err(HeaderError::Unsupported(format!(
                "TCP data offset {} with {} option bytes",
                self.data_offset,
                self.options.len()
            )));
        }

        let total_len = header_len + self.payload.len();
        if buf.len() < total_len {
            return Err(HeaderError::BufferTooSmall { expected: total_len, found: buf.len() });
        }

        buf[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        buf[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        buf[4..8].copy_from_slice(&self.seqno.raw_value().to_be_bytes());
        buf[8..12].copy_from_slice(&self.ackno.raw_value().to_be_bytes());
        buf[12] = (self.data_offset << 4) | self.reserved;
        buf[13] = self.flags.bits();
        buf[14..16].copy_from_slice(&self.window.to_be_bytes());
        buf[16..18].fill(0); // Checksum is computed with this field zeroed
        buf[18..20].copy_from_slice(&self.urgent.to_be_bytes());
        buf[20..header_len].copy_from_slice(&self.options);
        buf[header_len..total_len].copy_from_slice(&self.payload);

        let checksum = Self::checksum(&buf[..total_len], iph);
        buf[16..18].copy_from_slice(&checksum.to_be_bytes());

        Ok(total_len)
    }

    /// Parse a whole TCP segment. `buf` must hold exactly the segment, since
    /// the checksum covers every byte of it.
    pub fn parse(buf: &[u8], iph: &Ipv4Header) -> Result<Self, HeaderError> {
        if buf.len() < Self::MIN_LENGTH {
            return Err(HeaderError::BufferTooSmall { expected: Self::MIN_LENGTH, found: buf.len() });
        }

        let data_offset = buf[12] >> 4;
        let header_len = data_offset as usize * 4;
        if header_len < Self::MIN_LENGTH {
            return Err(HeaderError::Unsupported(format!("TCP data offset {data_offset}")));
        }
        if buf.len() < header_len {
            return Err(HeaderError::BufferTooSmall { expected: header_len, found: buf.len() });
        }

        if Self::checksum(buf, iph) != 0 {
            return Err(HeaderError::BadChecksum("TCP".to_string()));
        }

        Ok(TcpHeader {
            src_port: u16::from_be_bytes([buf[0], buf[1]]),
            dst_port: u16::from_be_bytes([buf[2], buf[3]]),
            seqno: Wrap32::new(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]])),
            ackno: Wrap32::new(u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]])),
            data_offset,
            reserved: buf[12] & 0x0f,
            flags: TcpFlags::from_bits_truncate(buf[13]),
            window: u16::from_be_bytes([buf[14], buf[15]]),
            checksum: u16::from_be_bytes([buf[16], buf[17]]),
            urgent: u16::from_be_bytes([buf[18], buf[19]]),
            options: buf[Self::MIN_LENGTH..header_len].to_vec(),
            payload: buf[header_len..].to_vec(),
        })
    }

    /// Internet checksum of `data` prefixed by the IPv4 pseudo-header
    pub fn checksum(data: &[u8], iph: &Ipv4Header) -> u16 {
        let mut pseudo = Vec::with_capacity(12 + data.len());
        pseudo.extend_from_slice(&iph.src_ip.octets());
        pseudo.extend_from_slice(&iph.dst_ip.octets());
        pseudo.push(0);
        pseudo.push(iph.protocol);
        pseudo.extend_from_slice(&(data.len() as u16).to_be_bytes());
        pseudo.extend_from_slice(data);

        Ipv4Header::checksum(&pseudo)
    }
}

// -- Unit tests --
