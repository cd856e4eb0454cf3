use crate::tcp::byte_stream::Writer;

/// Puts out-of-order, possibly overlapping substrings back into stream order.
///
/// Bytes that arrive ahead of the next expected index are staged in a ring
/// of the same size as the output stream, with a bitmap marking which slots
/// hold a pending byte. Nothing past the output's available capacity is ever
/// staged.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,         // Staged bytes, indexed relative to `buf_index`
    present: Vec<bool>,      // Which slots of `buffer` hold a pending byte
    buf_index: usize,        // Ring slot of the byte at `next_index`
    next_index: u64,         // First absolute index not yet pushed to the output
    last_index: Option<u64>, // One past the final byte, once known
    bytes_pending: usize,    // Number of marked slots
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data`, whose first byte sits at absolute `first_index`, and push
    /// every byte that has become contiguous into `output`.
    pub fn insert(&mut self, first_index: u64, data: &[u8], is_last_substring: bool, output: &mut Writer<'_>) {
        if self.buffer.is_empty() {
            let cap = output.capacity();
            self.buffer = vec![0u8; cap];
            self.present = vec![false; cap];
        }

        let data_len = data.len() as u64;
        let mut cur_cap = output.available_capacity().min(self.buffer.len());

        if is_last_substring {
            self.last_index = Some(first_index + data_len);
        }

        if first_index > self.next_index {
            self.stage(first_index - self.next_index, data, cur_cap);
        } else if self.next_index < first_index + data_len {
            let start = (self.next_index - first_index) as usize;
            let len = (data.len() - start).min(cur_cap);
            output.push(&data[start..start + len]);

            // Anything staged in the range just delivered is stale now
            for offset in 0..len {
                let i = (self.buf_index + offset) % self.buffer.len();
                if self.present[i] {
                    self.present[i] = false;
                    self.bytes_pending -= 1;
                }
            }

            cur_cap -= len;
            self.advance(len);
            self.flush_contiguous(cur_cap, output);
        }

        if let Some(last_index) = self.last_index {
            if self.next_index >= last_index {
                output.close();
            }
        }
    }

    /// Number of bytes staged but not yet pushed to the output
    pub fn bytes_pending(&self) -> usize {
        self.bytes_pending
    }

    /// The first absolute index not yet pushed to the output
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Stage the part of `data` that lands inside the window, `delta` bytes
    /// past the next expected index
    fn stage(&mut self, delta: u64, data: &[u8], cur_cap: usize) {
        if delta >= cur_cap as u64 {
            log::trace!("dropping {} bytes beyond the reassembly window", data.len());
            return;
        }

        let delta = delta as usize;
        let len = data.len().min(cur_cap - delta);
        let mut i = (self.buf_index + delta) % self.buffer.len();
        for &byte in &data[..len] {
            if !self.present[i] {
                self.present[i] = true;
                self.buffer[i] = byte;
                self.bytes_pending += 1;
            }
            i = (i + 1) % self.buffer.len();
        }
    }

    /// Push the run of staged bytes starting at the next expected index
    fn flush_contiguous(&mut self, cur_cap: usize, output: &mut Writer<'_>) {
        let mut run = Vec::new();
        let mut i = self.buf_index;
        while run.len() < cur_cap && self.present[i] {
            self.present[i] = false;
            run.push(self.buffer[i]);
            i = (i + 1) % self.buffer.len();
        }

        if run.is_empty() {
            return;
        }

        self.bytes_pending -= run.len();
        output.push(&run);
        self.advance(run.len());
    }

    fn advance(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.next_index += len as u64;
        self.buf_index = (self.buf_index + len) % self.buffer.len();
    }
}

// -- Unit tests --
