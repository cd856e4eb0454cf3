//! A user-space TCP/IP data path: flow-controlled byte streams, segment
//! reassembly, a TCP sender and receiver, ARP-resolving network interfaces
//! and a longest-prefix-match router. Time only advances through explicit
//! `tick` calls, so every component is deterministic.

pub mod config;
pub mod net;
pub mod tcp;
