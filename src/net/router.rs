use std::net::Ipv4Addr;

use thiserror::Error;

use crate::net::network_interface::NetworkInterface;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouterError {
    #[error("No interface with index {0}")]
    NoSuchInterface(usize),
    #[error("Invalid prefix length {0}")]
    InvalidPrefixLength(u8),
}

/// One forwarding rule: datagrams whose destination falls under
/// `prefix/prefix_length` leave through `interface_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: Ipv4Addr,
    pub prefix_length: u8,
    pub next_hop: Option<Ipv4Addr>, // None if the network is directly attached
    pub interface_index: usize,
}

impl RouteEntry {
    fn mask(&self) -> u32 {
        match self.prefix_length {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n)),
        }
    }

    pub fn matches(&self, dst: Ipv4Addr) -> bool {
        let mask = self.mask();
        u32::from(dst) & mask == u32::from(self.prefix) & mask
    }
}

/// Forwards datagrams between its interfaces by longest-prefix match
#[derive(Debug, Default)]
pub struct Router {
    interfaces: Vec<NetworkInterface>,
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an interface and return its index
    pub fn add_interface(&mut self, interface: NetworkInterface) -> usize {
        self.interfaces.push(interface);
        self.interfaces.len() - 1
    }

    pub fn interface(&self, index: usize) -> Option<&NetworkInterface> {
        self.interfaces.get(index)
    }

    pub fn interface_mut(&mut self, index: usize) -> Option<&mut NetworkInterface> {
        self.interfaces.get_mut(index)
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        prefix_length: u8,
        next_hop: Option<Ipv4Addr>,
        interface_index: usize,
    ) -> Result<(), RouterError> {
        if prefix_length > 32 {
            return Err(RouterError::InvalidPrefixLength(prefix_length));
        }
        if interface_index >= self.interfaces.len() {
            return Err(RouterError::NoSuchInterface(interface_index));
        }

        log::debug!(
            "adding route {}/{} => {} on interface {}",
            prefix,
            prefix_length,
            next_hop.map_or_else(|| "(direct)".to_string(), |hop| hop.to_string()),
            interface_index
        );
        self.routes.push(RouteEntry {
            prefix,
            prefix_length,
            next_hop,
            interface_index,
        });
        Ok(())
    }

    /// Drain every interface's received datagrams and forward each one
    pub fn route(&mut self) {
        for index in 0..self.interfaces.len() {
            while let Some(mut dgram) = self.interfaces[index].maybe_receive() {
                if dgram.header.ttl <= 1 {
                    log::debug!("dropping datagram to {}: TTL expired", dgram.header.dst_ip);
                    continue;
                }
                dgram.header.ttl -= 1;
                dgram.header.compute_checksum();

                let dst = dgram.header.dst_ip;
                let Some(route) = self.longest_match(dst) else {
                    log::debug!("dropping datagram to {}: no route", dst);
                    continue;
                };

                let next_hop = route.next_hop.unwrap_or(dst);
                self.interfaces[route.interface_index].send_datagram(&dgram, next_hop);
            }
        }
    }

    fn longest_match(&self, dst: Ipv4Addr) -> Option<RouteEntry> {
        let mut best: Option<RouteEntry> = None;
        for route in self.routes.iter().filter(|r| r.matches(dst)) {
            if best.map_or(true, |b| route.prefix_length > b.prefix_length) {
                best = Some(*route);
            }
        }
        best
    }
}

// -- Unit tests --
