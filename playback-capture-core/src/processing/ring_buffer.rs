/// Fixed-capacity circular buffer for audio samples.
///
/// Not synchronized; wrap in `parking_lot::Mutex` for cross-thread access.
///
/// Overflow behavior: drops oldest samples and counts them.
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// `capacity` is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![T::default(); capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
        }
    }

    /// Write samples into the ring buffer.
    ///
    /// Returns how many previously buffered or incoming samples were dropped
    /// to make room. If `samples` is larger than capacity, only the last
    /// `capacity` samples are kept.
    pub fn write(&mut self, samples: &[T]) -> usize {
        if samples.is_empty() {
            return 0;
        }

        let mut dropped = 0;
        let samples = if samples.len() > self.capacity {
            dropped += samples.len() - self.capacity;
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let overflow = (self.available + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % self.capacity;
            self.available -= overflow;
            dropped += overflow;
        }

        for &sample in samples {
            self.buffer[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
        self.available += samples.len();
        dropped
    }

    /// Move up to `out.len()` samples into `out`, returning how many were copied.
    pub fn read_into(&mut self, out: &mut [T]) -> usize {
        let to_read = out.len().min(self.available);
        for (i, slot) in out.iter_mut().take(to_read).enumerate() {
            *slot = self.buffer[(self.read_index + i) % self.capacity];
        }
        self.read_index = (self.read_index + to_read) % self.capacity;
        self.available -= to_read;
        to_read
    }

    /// Number of samples currently available for reading.
    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(buf: &mut RingBuffer<i16>, count: usize) -> Vec<i16> {
        let mut out = vec![0i16; count];
        let read = buf.read_into(&mut out);
        out.truncate(read);
        out
    }

    #[test]
    fn basic_write_read() {
        let mut buf = RingBuffer::new(10);
        assert_eq!(buf.write(&[1i16, 2, 3]), 0);

        assert_eq!(buf.count(), 3);
        assert_eq!(take(&mut buf, 3), vec![1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn read_partial() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1i16, 2, 3, 4, 5]);

        assert_eq!(take(&mut buf, 3), vec![1, 2, 3]);
        assert_eq!(buf.count(), 2);

        let rest = take(&mut buf, 10); // request more than available
        assert_eq!(rest, vec![4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1i16, 2, 3, 4]);
        assert_eq!(buf.write(&[5, 6]), 2); // drops 1, 2

        assert_eq!(buf.count(), 4);
        assert_eq!(take(&mut buf, 4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn write_larger_than_capacity() {
        let mut buf = RingBuffer::new(3);
        assert_eq!(buf.write(&[1i16, 2, 3, 4, 5]), 2);

        assert_eq!(buf.count(), 3);
        assert_eq!(take(&mut buf, 3), vec![3, 4, 5]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::new(4);

        buf.write(&[1i16, 2, 3]);
        take(&mut buf, 2); // read_index = 2

        buf.write(&[4, 5, 6]); // wraps around

        assert_eq!(buf.count(), 4);
        assert_eq!(take(&mut buf, 4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn read_into_reuses_caller_buffer() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[7i16, 8, 9]);

        let mut out = [0i16; 2];
        assert_eq!(buf.read_into(&mut out), 2);
        assert_eq!(out, [7, 8]);
        assert_eq!(buf.read_into(&mut out), 1);
        assert_eq!(out[0], 9);
        assert_eq!(buf.read_into(&mut out), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf: RingBuffer<i16> = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.write(&[1, 2]);
        assert_eq!(take(&mut buf, 5), vec![2]);
    }
}
