//! Lock-free SPSC sample buffer between the audio callback and the capture
//! loop, backed by rtrb. The callback side must never block or allocate;
//! overflow drops the newest samples and is surfaced through a counter
//! rather than a log line per occurrence.

use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct SampleRing {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
    dropped: Arc<AtomicU64>,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self {
            producer,
            consumer,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn split(self) -> (SampleWriter, SampleReader) {
        (
            SampleWriter {
                producer: self.producer,
                dropped: self.dropped.clone(),
            },
            SampleReader {
                consumer: self.consumer,
                dropped: self.dropped,
            },
        )
    }
}

/// Callback half. Real-time safe: partial writes on overflow, no blocking.
pub struct SampleWriter {
    producer: Producer<i16>,
    dropped: Arc<AtomicU64>,
}

impl SampleWriter {
    pub fn push(&mut self, samples: &[i16]) -> usize {
        let writable = self.producer.slots().min(samples.len());
        if writable < samples.len() {
            self.dropped
                .fetch_add((samples.len() - writable) as u64, Ordering::Relaxed);
        }
        if writable == 0 {
            return 0;
        }

        let mut chunk = match self.producer.write_chunk(writable) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        second.copy_from_slice(&samples[split..split + second.len()]);
        chunk.commit_all();
        writable
    }
}

/// Capture-loop half.
pub struct SampleReader {
    consumer: Consumer<i16>,
    dropped: Arc<AtomicU64>,
}

impl SampleReader {
    pub fn pop(&mut self, buffer: &mut [i16]) -> usize {
        let readable = self.consumer.slots().min(buffer.len());
        if readable == 0 {
            return 0;
        }
        let chunk = match self.consumer.read_chunk(readable) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };
        let (first, second) = chunk.as_slices();
        let split = first.len();
        buffer[..split].copy_from_slice(first);
        buffer[split..split + second.len()].copy_from_slice(second);
        let len = chunk.len();
        chunk.commit_all();
        len
    }

    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
