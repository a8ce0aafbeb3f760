//! Bounded byte FIFO backing anonymous pipes
//!
//! A fixed-capacity circular queue with an explicit `full` flag. `front ==
//! (rear + 1) % capacity` holds both when the queue is empty and when it is
//! full, so the flag disambiguates; empty is that equality with the flag
//! clear.
//!
//! The queue carries no synchronisation of its own. It only ever runs under
//! a kernel handler, which executes to completion with IRQs masked; sharing
//! between the read and write open-file entries of one pipe goes through
//! `Arc<spin::Mutex<Pipe>>` in the descriptor layer.

/// Capacity of every pipe, in bytes.
pub const PIPE_CAPACITY: usize = 32;

pub struct Pipe {
    buf: [u8; PIPE_CAPACITY],
    front: usize,
    rear: usize,
    full: bool,
}

impl Pipe {
    /// An empty pipe: rear sits one slot behind front.
    pub const fn new() -> Self {
        Self {
            buf: [0; PIPE_CAPACITY],
            front: 0,
            rear: PIPE_CAPACITY - 1,
            full: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.front == (self.rear + 1) % PIPE_CAPACITY
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        if self.full {
            PIPE_CAPACITY
        } else {
            (self.rear + 1 + PIPE_CAPACITY - self.front) % PIPE_CAPACITY
        }
    }

    /// Enqueue up to `src.len()` bytes, stopping early when the queue fills.
    /// Returns the number actually written; a short count is a normal
    /// result, not an error.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let mut written = 0;
        for &byte in src {
            if self.full {
                break;
            }
            self.rear = (self.rear + 1) % PIPE_CAPACITY;
            self.buf[self.rear] = byte;
            written += 1;
            if self.front == (self.rear + 1) % PIPE_CAPACITY {
                self.full = true;
            }
        }
        written
    }

    /// Dequeue up to `dst.len()` bytes, stopping early when the queue
    /// drains. The first byte out clears the full state.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut read = 0;
        for slot in dst.iter_mut() {
            if self.is_empty() {
                break;
            }
            *slot = self.buf[self.front];
            self.front = (self.front + 1) % PIPE_CAPACITY;
            self.full = false;
            read += 1;
        }
        read
    }

    /// Structural soundness, asserted at handler-exit points.
    pub fn invariants_hold(&self) -> bool {
        self.front < PIPE_CAPACITY
            && self.rear < PIPE_CAPACITY
            && (!self.full || self.front == (self.rear + 1) % PIPE_CAPACITY)
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}
