use rtrb::{Consumer, Producer, RingBuffer};

/// Lock-free SPSC transport ring between the capture callback and the
/// analysis worker, built on rtrb (real-time safe).
pub struct AudioRingBuffer {
    producer: Producer<f32>,
    consumer: Consumer<f32>,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into producer and consumer for separate threads.
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback thread.
pub struct AudioProducer {
    producer: Producer<f32>,
}

impl AudioProducer {
    /// Write samples from the audio callback (non-blocking). The whole write
    /// is rejected when the ring is full; the callback counts the drop and
    /// stays silent, logging happens off the real-time path.
    pub fn write(&mut self, samples: &[f32]) -> Result<usize, ()> {
        let mut chunk = match self.producer.write_chunk(samples.len()) {
            Ok(chunk) => chunk,
            Err(_) => return Err(()),
        };

        // Write may wrap; fill both slices
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        if split > 0 {
            first.copy_from_slice(&samples[..split]);
        }
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..]);
        }
        chunk.commit_all();
        Ok(samples.len())
    }

    /// Check available space
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, owned by the analysis worker.
pub struct AudioConsumer {
    consumer: Consumer<f32>,
}

impl AudioConsumer {
    /// Read up to `buffer.len()` samples (non-blocking); returns the count.
    pub fn read(&mut self, buffer: &mut [f32]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                match self.consumer.read_chunk(available) {
                    Ok(chunk) => chunk,
                    Err(_) => return 0,
                }
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        if split > 0 {
            buffer[..split].copy_from_slice(first);
        }
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    /// Samples currently available to read.
    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }
}
