use std::io;
use std::io::{Read, Write};

/// A fixed-capacity byte pipe. Bytes are written through a [`Writer`] and
/// consumed through a [`Reader`]; both views borrow the same storage.
///
/// One slot of the backing array is reserved so that a full buffer can be
/// told apart from an empty one. The unread region never wraps: when the tail
/// would run into the physical end of the array, the unread bytes are shifted
/// back to the front instead.
#[derive(Debug)]
pub struct ByteStream {
    buffer: Box<[u8]>,  // Backing storage, `capacity + 1` bytes long
    head: usize,        // Index of the first unread byte
    tail: usize,        // Index one past the last written byte
    closed: bool,       // No more bytes will be pushed
    error: bool,        // The stream was terminated abnormally
    bytes_pushed: u64,  // Cumulative bytes accepted by the writer
    bytes_popped: u64,  // Cumulative bytes consumed by the reader
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        ByteStream {
            buffer: vec![0u8; capacity + 1].into_boxed_slice(),
            head: 0,
            tail: 0,
            closed: false,
            error: false,
            bytes_pushed: 0,
            bytes_popped: 0,
        }
    }

    /// The write-side view of this stream
    pub fn writer(&mut self) -> Writer<'_> {
        Writer { stream: self }
    }

    /// The read-side view of this stream
    pub fn reader(&mut self) -> Reader<'_> {
        Reader { stream: self }
    }

    /// Usable capacity, not counting the reserved slot
    pub fn capacity(&self) -> usize {
        self.buffer.len() - 1
    }

    pub fn is_full(&self) -> bool {
        (self.tail + 1) % self.buffer.len() == self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn bytes_buffered(&self) -> usize {
        (self.tail + self.buffer.len() - self.head) % self.buffer.len()
    }

    pub fn available_capacity(&self) -> usize {
        self.capacity() - self.bytes_buffered()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.bytes_pushed
    }

    pub fn bytes_popped(&self) -> u64 {
        self.bytes_popped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed and fully drained
    pub fn is_finished(&self) -> bool {
        self.closed && self.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    /// Move the unread region to the front of the backing array
    fn compact(&mut self) {
        let len = self.tail - self.head;
        self.buffer.copy_within(self.head..self.tail, 0);
        self.head = 0;
        self.tail = len;
    }

    fn push(&mut self, data: &[u8]) -> usize {
        if self.closed {
            log::trace!("dropping {} bytes pushed into a closed stream", data.len());
            return 0;
        }

        let n = data.len().min(self.available_capacity());
        if n == 0 {
            return 0;
        }

        if self.tail + n >= self.buffer.len() {
            self.compact();
        }

        self.buffer[self.tail..self.tail + n].copy_from_slice(&data[..n]);
        self.tail += n;
        self.bytes_pushed += n as u64;
        n
    }

    fn peek(&self) -> &[u8] {
        &self.buffer[self.head..self.tail]
    }

    fn pop(&mut self, len: usize) -> usize {
        let n = len.min(self.bytes_buffered());
        self.head += n;
        if self.is_empty() {
            // Drained: rewind both indices
            self.head = 0;
            self.tail = 0;
        }
        self.bytes_popped += n as u64;
        n
    }
}

/// The producer's capabilities over a [`ByteStream`]
#[derive(Debug)]
pub struct Writer<'a> {
    stream: &'a mut ByteStream,
}

impl Writer<'_> {
    /// Push as many leading bytes of `data` as fit; the rest is dropped.
    /// Returns the number of bytes accepted.
    pub fn push(&mut self, data: &[u8]) -> usize {
        self.stream.push(data)
    }

    /// Signal that no more bytes will be pushed
    pub fn close(&mut self) {
        self.stream.closed = true;
    }

    /// Signal that the stream was terminated abnormally
    pub fn set_error(&mut self) {
        self.stream.error = true;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }

    pub fn available_capacity(&self) -> usize {
        self.stream.available_capacity()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.stream.bytes_pushed()
    }

    pub fn capacity(&self) -> usize {
        self.stream.capacity()
    }
}

impl Write for Writer<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.push(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The consumer's capabilities over a [`ByteStream`]
#[derive(Debug)]
pub struct Reader<'a> {
    stream: &'a mut ByteStream,
}

impl Reader<'_> {
    /// A view of every buffered byte, without consuming
    pub fn peek(&self) -> &[u8] {
        self.stream.peek()
    }

    /// Remove up to `len` bytes. Returns how many were removed.
    pub fn pop(&mut self, len: usize) -> usize {
        self.stream.pop(len)
    }

    /// Pop up to `len` bytes into an owned buffer
    pub fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        let n = len.min(self.bytes_buffered());
        let data = self.peek()[..n].to_vec();
        self.pop(n);
        data
    }

    pub fn is_finished(&self) -> bool {
        self.stream.is_finished()
    }

    pub fn has_error(&self) -> bool {
        self.stream.has_error()
    }

    pub fn bytes_buffered(&self) -> usize {
        self.stream.bytes_buffered()
    }

    pub fn bytes_popped(&self) -> u64 {
        self.stream.bytes_popped()
    }
}

impl Read for Reader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = buf.len().min(self.bytes_buffered());
        buf[..to_read].copy_from_slice(&self.peek()[..to_read]);
        self.pop(to_read);
        Ok(to_read)
    }
}

// -- Unit tests --
