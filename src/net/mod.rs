pub mod arp;
pub mod errors;
pub mod ethernet;
pub mod ip_flags;
pub mod ip_header;
pub mod network_interface;
pub mod router;

// -- Re-export structs for more concise usage

pub use ethernet::{EthernetAddress, EthernetFrame};
pub use ip_header::InternetDatagram;
pub use network_interface::NetworkInterface;
pub use router::{RouteEntry, Router, RouterError};
