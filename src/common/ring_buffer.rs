use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{ConfigError, Error};

/// Fixed capacity sample storage shared between cursor views.
///
/// Samples live in relaxed atomic cells so the real time context and the
/// worker can hold separate views onto the same storage without locks. Which
/// context may write which region is a contract of the pipeline, not of the
/// storage: the capacity must leave room for a full window, a hop and the
/// worker's latency between the writer and the reader.
struct SampleStore {
    cells: Box<[AtomicU32]>,
}

impl SampleStore {
    #[inline]
    fn load(&self, index: usize) -> f32 {
        f32::from_bits(self.cells[index].load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, index: usize, value: f32) {
        self.cells[index].store(value.to_bits(), Ordering::Relaxed)
    }
}

/// A circular buffer of samples with independent read and write cursors.
///
/// All indices are normalized modulo the capacity, negative ones included,
/// so no operation can go out of bounds. Both cursors are always in
/// `[0, capacity)`.
///
/// ```
/// use micro_tune::common::RingBuffer;
///
/// let mut buffer = RingBuffer::new(4).unwrap();
/// for value in [1.0, 2.0, 3.0, 4.0, 5.0].iter() {
///     buffer.insert(*value);
/// }
/// // The fifth insert wrapped around and overwrote the first sample.
/// assert_eq!(buffer.read_at(0), 5.0);
/// assert_eq!(buffer.read_at(-1), 4.0);
/// assert_eq!(buffer.write_cursor(), 1);
/// ```
pub struct RingBuffer {
    store: Arc<SampleStore>,
    write_cursor: usize,
    read_cursor: usize,
}

impl RingBuffer {
    /// Creates a zero filled buffer holding `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(ConfigError::Zero {
                name: "ring buffer capacity",
            }
            .into());
        }
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(capacity)
            .map_err(|_| Error::ResourceExhausted {
                what: "ring buffer",
                len: capacity,
            })?;
        cells.extend((0..capacity).map(|_| AtomicU32::new(0)));
        Ok(RingBuffer {
            store: Arc::new(SampleStore {
                cells: cells.into_boxed_slice(),
            }),
            write_cursor: 0,
            read_cursor: 0,
        })
    }

    /// Returns a new view onto the same storage, with its own cursors
    /// starting at this view's positions.
    pub fn share(&self) -> RingBuffer {
        RingBuffer {
            store: self.store.clone(),
            write_cursor: self.write_cursor,
            read_cursor: self.read_cursor,
        }
    }

    pub fn capacity(&self) -> usize {
        self.store.cells.len()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Maps an arbitrary, possibly negative, index into `[0, capacity)`.
    #[inline]
    pub fn wrap(&self, index: isize) -> usize {
        index.rem_euclid(self.capacity() as isize) as usize
    }

    pub fn set_write_cursor(&mut self, index: isize) {
        self.write_cursor = self.wrap(index);
    }

    pub fn set_read_cursor(&mut self, index: isize) {
        self.read_cursor = self.wrap(index);
    }

    /// Overwrites the sample at the write cursor and advances the cursor.
    #[inline]
    pub fn insert(&mut self, value: f32) {
        self.store.store(self.write_cursor, value);
        self.advance_write_cursor();
    }

    /// Adds to the sample at the write cursor and advances the cursor.
    #[inline]
    pub fn insert_and_add(&mut self, value: f32) {
        let sum = self.store.load(self.write_cursor) + value;
        self.store.store(self.write_cursor, sum);
        self.advance_write_cursor();
    }

    #[inline]
    pub fn read_at(&self, index: isize) -> f32 {
        self.store.load(self.wrap(index))
    }

    /// Reads the sample at `index` and sets it to zero.
    #[inline]
    pub fn read_and_clear_at(&self, index: isize) -> f32 {
        let index = self.wrap(index);
        let value = self.store.load(index);
        self.store.store(index, 0.0);
        value
    }

    /// Reads the sample at the read cursor and advances the cursor.
    #[inline]
    pub fn read_next(&mut self) -> f32 {
        let value = self.store.load(self.read_cursor);
        self.advance_read_cursor();
        value
    }

    /// Reads and clears the sample at the read cursor, then advances the cursor.
    #[inline]
    pub fn read_and_clear_next(&mut self) -> f32 {
        let value = self.store.load(self.read_cursor);
        self.store.store(self.read_cursor, 0.0);
        self.advance_read_cursor();
        value
    }

    /// Copies `destination.len()` samples ending just before `end` into `destination`,
    /// oldest sample first.
    pub fn copy_ending_at(&self, end: isize, destination: &mut [f32]) {
        let start = end - destination.len() as isize;
        for (offset, value) in destination.iter_mut().enumerate() {
            *value = self.read_at(start + offset as isize);
        }
    }

    #[inline]
    fn advance_write_cursor(&mut self) {
        self.write_cursor += 1;
        if self.write_cursor == self.capacity() {
            self.write_cursor = 0;
        }
    }

    #[inline]
    fn advance_read_cursor(&mut self) {
        self.read_cursor += 1;
        if self.read_cursor == self.capacity() {
            self.read_cursor = 0;
        }
    }
}
