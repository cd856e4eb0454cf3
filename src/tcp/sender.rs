use std::collections::VecDeque;

use crate::config::TcpConfig;
use crate::tcp::byte_stream::Reader;
use crate::tcp::message::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::wrap32::Wrap32;

/// A segment that was sent but is not yet fully acknowledged
#[derive(Debug)]
struct Outstanding {
    abs_seqno: u64,
    message: TcpSenderMessage,
}

/// The sender end of a TCP connection.
///
/// Cuts the outbound stream into segments that fit the peer's advertised
/// window, keeps every unacknowledged segment, and retransmits the oldest one
/// with exponential backoff when the retransmission timer expires. Time only
/// moves through [`TcpSender::tick`].
#[derive(Debug)]
pub struct TcpSender {
    isn: Wrap32,
    initial_rto_ms: u64,
    max_payload_size: usize,

    next_seqno: u64,                     // Absolute seqno of the next new byte
    ready: VecDeque<TcpSenderMessage>,   // Waiting for `maybe_send`
    outstanding: VecDeque<Outstanding>,  // Sent but un'acked segments, oldest first
    fin_sent: bool,
    bytes_in_flight: u64,
    window_size: u64, // Last window advertised by the peer

    clock: u64,                 // Milliseconds since construction
    timer_started: Option<u64>, // When the retransmission timer was armed
    rto_ms: u64,
    consecutive_retransmissions: u64,
}

impl TcpSender {
    /// Uses a random ISN unless `fixed_isn` is given
    pub fn new(initial_rto_ms: u64, fixed_isn: Option<Wrap32>) -> Self {
        TcpSender {
            isn: fixed_isn.unwrap_or_else(|| Wrap32::new(rand::random())),
            initial_rto_ms,
            max_payload_size: TcpConfig::MAX_PAYLOAD_SIZE,
            next_seqno: 0,
            ready: VecDeque::new(),
            outstanding: VecDeque::new(),
            fin_sent: false,
            bytes_in_flight: 0,
            // Start at 1 so the first SYN retransmission still backs off
            window_size: 1,
            clock: 0,
            timer_started: None,
            rto_ms: initial_rto_ms,
            consecutive_retransmissions: 0,
        }
    }

    pub fn from_config(config: &TcpConfig) -> Self {
        let mut sender = TcpSender::new(config.rt_timeout, config.fixed_isn);
        sender.max_payload_size = config.max_payload_size;
        sender
    }

    pub fn isn(&self) -> Wrap32 {
        self.isn
    }

    /// Absolute sequence number of the next byte to be sent
    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    /// How many sequence numbers are outstanding
    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// How many retransmissions happened since the last new acknowledgment
    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retransmissions
    }

    /// The current retransmission timeout, in milliseconds
    pub fn rto_ms(&self) -> u64 {
        self.rto_ms
    }

    /// Fill the peer's window with segments read from `outbound_stream`
    pub fn push(&mut self, outbound_stream: &mut Reader<'_>) {
        // A zero window is treated as one so the peer keeps being asked
        let window = self.window_size.max(1);

        while !self.fin_sent && window > self.bytes_in_flight {
            let mut msg = TcpSenderMessage {
                seqno: Wrap32::wrap(self.next_seqno, self.isn),
                syn: self.next_seqno == 0,
                ..Default::default()
            };

            let room = window - self.bytes_in_flight;
            let len = room
                .min(outbound_stream.bytes_buffered() as u64)
                .min(self.max_payload_size as u64) as usize;
            if len > 0 {
                msg.payload = outbound_stream.read_bytes(len);
            }

            if outbound_stream.is_finished() && msg.sequence_length() + self.bytes_in_flight < window {
                msg.fin = true;
                self.fin_sent = true;
            }

            if msg.sequence_length() == 0 {
                break;
            }

            if self.outstanding.is_empty() {
                self.timer_started = Some(self.clock);
            }

            let len = msg.sequence_length();
            self.ready.push_back(msg.clone());
            self.outstanding.push_back(Outstanding {
                abs_seqno: self.next_seqno,
                message: msg,
            });
            self.next_seqno += len;
            self.bytes_in_flight += len;
        }
    }

    /// The next segment to put on the wire, if any
    pub fn maybe_send(&mut self) -> Option<TcpSenderMessage> {
        self.ready.pop_front()
    }

    /// A segment that occupies no sequence numbers, for pure acknowledgments
    pub fn send_empty_message(&self) -> TcpSenderMessage {
        TcpSenderMessage {
            seqno: Wrap32::wrap(self.next_seqno, self.isn),
            ..Default::default()
        }
    }

    /// Handle an acknowledgment and window update from the peer
    pub fn receive(&mut self, msg: &TcpReceiverMessage) {
        let Some(ackno) = msg.ackno else {
            self.window_size = msg.window_size as u64;
            return;
        };

        let ackno = ackno.unwrap(self.isn, self.next_seqno);
        if ackno > self.next_seqno {
            log::debug!(
                "discarding ack {} beyond next seqno {}",
                ackno,
                self.next_seqno
            );
            return;
        }
        self.window_size = msg.window_size as u64;

        match self.outstanding.front() {
            Some(front) if front.abs_seqno < ackno => {}
            _ => return,
        }

        while let Some(front) = self.outstanding.front() {
            let len = front.message.sequence_length();
            if front.abs_seqno + len > ackno {
                break;
            }
            self.bytes_in_flight -= len;
            self.outstanding.pop_front();
        }

        self.consecutive_retransmissions = 0;
        self.rto_ms = self.initial_rto_ms;
        self.timer_started = if self.outstanding.is_empty() {
            None
        } else {
            Some(self.clock)
        };
    }

    /// Advance the clock and retransmit the oldest segment if its timer expired
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.clock = self.clock.saturating_add(ms_since_last_tick);

        let (Some(front), Some(started)) = (self.outstanding.front(), self.timer_started) else {
            return;
        };
        if self.clock - started < self.rto_ms {
            return;
        }

        log::debug!(
            "retransmitting seqno {} after {} ms (attempt {})",
            front.abs_seqno,
            self.rto_ms,
            self.consecutive_retransmissions + 1
        );
        self.ready.push_back(front.message.clone());

        // Probing a zero window is not a sign of congestion
        if self.window_size > 0 {
            self.rto_ms = self.rto_ms.saturating_mul(2);
            self.consecutive_retransmissions += 1;
        }
        self.timer_started = Some(self.clock);
    }
}

// -- Unit tests --
