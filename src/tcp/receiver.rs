use crate::tcp::byte_stream::Writer;
use crate::tcp::message::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::reassembler::Reassembler;
use crate::tcp::wrap32::Wrap32;

/// The receiver end of a TCP connection. Learns the peer's ISN from the first
/// SYN, feeds payloads to the `Reassembler`, and reports the ack and window.
#[derive(Debug, Default)]
pub struct TcpReceiver {
    isn: Option<Wrap32>, // Learned from the first SYN, never renegotiated
}

impl TcpReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The peer's initial sequence number, once a SYN has been seen
    pub fn isn(&self) -> Option<Wrap32> {
        self.isn
    }

    /// Handle one inbound segment and return the resulting ack state
    pub fn receive(
        &mut self,
        message: TcpSenderMessage,
        reassembler: &mut Reassembler,
        inbound_stream: &mut Writer<'_>,
    ) -> TcpReceiverMessage {
        if message.syn {
            if self.isn.is_some() {
                log::trace!("ignoring repeated SYN at seqno {}", message.seqno);
                return self.send(inbound_stream);
            }
            self.isn = Some(message.seqno);
        }

        let Some(isn) = self.isn else {
            log::trace!("ignoring segment at seqno {} before SYN", message.seqno);
            return self.send(inbound_stream);
        };

        // The payload starts one past the SYN, if there is one
        let seqno = if message.syn { message.seqno + 1 } else { message.seqno };
        let absolute = seqno.unwrap(isn, inbound_stream.bytes_pushed());
        if absolute > 0 {
            reassembler.insert(absolute - 1, &message.payload, message.fin, inbound_stream);
        } else {
            log::trace!("segment at seqno {} has no stream position", message.seqno);
        }

        self.send(inbound_stream)
    }

    /// The ack number and window to advertise to the peer
    pub fn send(&self, inbound_stream: &Writer<'_>) -> TcpReceiverMessage {
        let window_size = inbound_stream.available_capacity().min(u16::MAX as usize) as u16;
        let Some(isn) = self.isn else {
            return TcpReceiverMessage { ackno: None, window_size };
        };

        // SYN and FIN each take one sequence number
        let mut absolute = inbound_stream.bytes_pushed() + 1;
        if inbound_stream.is_closed() {
            absolute += 1;
        }

        TcpReceiverMessage {
            ackno: Some(Wrap32::wrap(absolute, isn)),
            window_size,
        }
    }
}

// -- Unit tests --
