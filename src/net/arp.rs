use crate::net::errors::HeaderError;
use crate::net::ethernet::{EthernetAddress, EthernetHeader};
use std::net::Ipv4Addr;

/// An ARP message for IPv4 over Ethernet (RFC 826)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub opcode: u16,
    pub sender_ethernet_address: EthernetAddress,
    pub sender_ip_address: Ipv4Addr,
    pub target_ethernet_address: EthernetAddress,
    pub target_ip_address: Ipv4Addr,
}

impl ArpMessage {
    pub const LENGTH: usize = 28;
    pub const TYPE_ETHERNET: u16 = 1;
    pub const OPCODE_REQUEST: u16 = 1;
    pub const OPCODE_REPLY: u16 = 2;

    pub fn request(
        sender_ethernet_address: EthernetAddress,
        sender_ip_address: Ipv4Addr,
        target_ip_address: Ipv4Addr,
    ) -> Self {
        ArpMessage {
            opcode: Self::OPCODE_REQUEST,
            sender_ethernet_address,
            sender_ip_address,
            target_ethernet_address: EthernetAddress::default(),
            target_ip_address,
        }
    }

    pub fn reply(
        sender_ethernet_address: EthernetAddress,
        sender_ip_address: Ipv4Addr,
        target_ethernet_address: EthernetAddress,
        target_ip_address: Ipv4Addr,
    ) -> Self {
        ArpMessage {
            opcode: Self::OPCODE_REPLY,
            sender_ethernet_address,
            sender_ip_address,
            target_ethernet_address,
            target_ip_address,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LENGTH];

        buf[0..2].copy_from_slice(&Self::TYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&EthernetHeader::TYPE_IPV4.to_be_bytes());
        buf[4] = 6; // Hardware address length
        buf[5] = 4; // Protocol address length
        buf[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        buf[8..14].copy_from_slice(&self.sender_ethernet_address.0);
        buf[14..18].copy_from_slice(&self.sender_ip_address.octets());
        buf[18..24].copy_from_slice(&self.target_ethernet_address.0);
        buf[24..28].copy_from_slice(&self.target_ip_address.octets());

        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < Self::LENGTH {
            return Err(HeaderError::BufferTooSmall { expected: Self::LENGTH, found: buf.len() });
        }

        let hardware_type = u16::from_be_bytes([buf[0], buf[1]]);
        let protocol_type = u16::from_be_bytes([buf[2], buf[3]]);
        if hardware_type != Self::TYPE_ETHERNET || buf[4] != 6 {
            return Err(HeaderError::Unsupported(format!("ARP hardware type {hardware_type}")));
        }
        if protocol_type != EthernetHeader::TYPE_IPV4 || buf[5] != 4 {
            return Err(HeaderError::Unsupported(format!("ARP protocol type {protocol_type:#06x}")));
        }

        let opcode = u16::from_be_bytes([buf[6], buf[7]]);
        if opcode != Self::OPCODE_REQUEST && opcode != Self::OPCODE_REPLY {
            return Err(HeaderError::Unsupported(format!("ARP opcode {opcode}")));
        }

        let mut sender_ethernet_address = [0u8; 6];
        let mut target_ethernet_address = [0u8; 6];
        sender_ethernet_address.copy_from_slice(&buf[8..14]);
        target_ethernet_address.copy_from_slice(&buf[18..24]);

        Ok(ArpMessage {
            opcode,
            sender_ethernet_address: EthernetAddress(sender_ethernet_address),
            sender_ip_address: Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]),
            target_ethernet_address: EthernetAddress(target_ethernet_address),
            target_ip_address: Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]),
        })
    }
}

// -- Unit tests --
