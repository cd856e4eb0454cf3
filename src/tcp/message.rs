use crate::tcp::wrap32::Wrap32;

/// What a TCP sender puts on the wire: a sequence number, optional SYN and
/// FIN markers, and the payload in between
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpSenderMessage {
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
}

impl TcpSenderMessage {
    /// How many sequence numbers this message occupies
    pub fn sequence_length(&self) -> u64 {
        self.syn as u64 + self.payload.len() as u64 + self.fin as u64
    }
}

/// What a TCP receiver sends back: the next expected sequence number, once
/// a SYN has been seen, and the advertised window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpReceiverMessage {
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
}

// -- Unit tests --
