use netstack::tcp::{ByteStream, Reassembler};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::VecDeque;
use std::io;
use std::io::{Error, ErrorKind};
use std::time::Instant;

fn speed_test(num_chunks: usize, capacity: usize, random_seed: u64) -> io::Result<()> {
    // Generate random data
    let mut rng = StdRng::seed_from_u64(random_seed);
    let mut data = vec![0u8; num_chunks * capacity];
    rng.fill_bytes(&mut data);

    // Overlapping segments, each twice the stream capacity, starting at three offsets per chunk
    let mut chunks: VecDeque<(u64, &[u8], bool)> = VecDeque::new();
    for i in (0..data.len()).step_by(capacity) {
        for offset in 0..3 {
            let start = i + offset;
            if start > data.len() {
                continue;
            }
            let end = usize::min(start + capacity * 2, data.len());
            chunks.push_back((start as u64, &data[start..end], end >= data.len()));
        }
    }

    let mut ra = Reassembler::new();
    let mut stream = ByteStream::new(capacity);
    let mut output_buffer = Vec::with_capacity(data.len());

    let t0 = Instant::now();

    while let Some((first_index, segment, is_last)) = chunks.pop_front() {
        ra.insert(first_index, segment, is_last, &mut stream.writer());

        let mut reader = stream.reader();
        output_buffer.extend_from_slice(reader.peek());
        let n = reader.bytes_buffered();
        reader.pop(n);
    }

    let duration = t0.elapsed();

    if !stream.is_closed() {
        return Err(Error::new(
            ErrorKind::Other,
            "Reassembler did not close ByteStream when finished",
        ));
    }

    if data != output_buffer {
        return Err(Error::new(ErrorKind::Other, "Mismatch between data written and data read"));
    }

    // Calculate throughput
    let bytes_per_sec = data.len() as f64 / duration.as_secs_f64();
    let gigabits_per_sec = bytes_per_sec * 8.0 / 1e9;

    println!("Reassembler to ByteStream with capacity={capacity} reached {gigabits_per_sec:.2} Gbit/s");

    Ok(())
}

fn main() {
    env_logger::init();

    let num_chunks = 10_000;
    let capacity = 1500;
    let random_seed = 1370;

    if let Err(e) = speed_test(num_chunks, capacity, random_seed) {
        eprintln!("Speed test failed: {e}");
        std::process::exit(1);
    }
}
