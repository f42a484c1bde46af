//! Frame buffers and the pool that recycles them
//!
//! A [`FramePool`] owns a fixed number of equally sized buffers. The
//! receive loop claims a buffer as a [`Frame`], fills it and hands it to the
//! consumer; dropping or [`Frame::queue`]-ing the frame returns the buffer.
//!
//! Claim and return are lock-free: free buffers live in a bounded
//! lock-free queue and outstanding frames are counted atomically. Only
//! [`FramePool::resize_buffer`] takes a lock, and it fails with
//! [`PoolError::Busy`] while any frame is outstanding.
//!
//! Frames hold a weak reference to their pool. A frame that outlives its
//! pool, or was [`Frame::unpool`]-ed, is a plain owned buffer.

mod stream;

pub use stream::{FrameInfo, FrameSource, OverflowPolicy, StreamConfig, StreamReceiver, StreamStats};

use crate::error::PoolError;
use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Life cycle stage of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Held by the pool
    Free,
    /// Claimed by the receiver, being filled
    Filling,
    /// Filled, waiting for the consumer
    Ready,
    /// Handed to the consumer
    Consumed,
}

/// One buffer cycling between pool, receiver and consumer
pub struct Frame {
    buffer: Vec<u8>,
    pool: Weak<PoolShared>,
    offset: usize,
    size: usize,
    status: u32,
    state: FrameState,
}

impl Frame {
    /// Frame not attached to any pool
    pub fn unpooled(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            pool: Weak::new(),
            offset: 0,
            size: 0,
            status: 0,
            state: FrameState::Filling,
        }
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Valid data (`offset..offset + size`)
    pub fn data(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.size]
    }

    /// Offset of the valid data within the buffer
    pub fn data_offset(&self) -> usize {
        self.offset
    }

    /// Number of valid bytes
    pub fn data_size(&self) -> usize {
        self.size
    }

    /// Whole buffer, for filling
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Record where the valid data lives
    pub fn set_data(&mut self, offset: usize, size: usize) -> Result<(), PoolError> {
        let end = offset.saturating_add(size);
        if end > self.buffer.len() {
            return Err(PoolError::OutOfBounds {
                end,
                capacity: self.buffer.len(),
            });
        }
        self.offset = offset;
        self.size = size;
        Ok(())
    }

    /// Status reported with the data
    pub fn status(&self) -> u32 {
        self.status
    }

    /// Record the status reported with the data
    pub fn set_status(&mut self, status: u32) {
        self.status = status;
    }

    /// Current life cycle stage
    pub fn state(&self) -> FrameState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: FrameState) {
        self.state = state;
    }

    /// Whether the frame still returns to a live pool
    pub fn is_pooled(&self) -> bool {
        self.pool.strong_count() > 0
    }

    /// Return the frame to its pool. No-op if the pool is gone.
    pub fn queue(self) {
        drop(self)
    }

    /// Done consuming; same as [`Frame::queue`]
    pub fn release(self) {
        self.queue()
    }

    /// Detach from the pool and keep the buffer
    ///
    /// The pool shrinks by one frame.
    pub fn unpool(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.members.fetch_sub(1, Ordering::AcqRel);
            pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        }
        self.pool = Weak::new();
    }

    /// Detach from the pool and take the buffer
    pub fn into_buffer(mut self) -> Vec<u8> {
        self.unpool();
        std::mem::take(&mut self.buffer)
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            let buffer = std::mem::take(&mut self.buffer);
            pool.give_back(buffer);
        }
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("capacity", &self.capacity())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("status", &self.status)
            .field("state", &self.state)
            .finish()
    }
}

struct PoolShared {
    free: ArrayQueue<Vec<u8>>,
    members: AtomicUsize,
    outstanding: AtomicUsize,
    buffer_size: AtomicUsize,
    resize: Mutex<()>,
    waiting: AtomicUsize,
    waiters: Mutex<()>,
    returned: Condvar,
}

impl PoolShared {
    fn give_back(&self, buffer: Vec<u8>) {
        if self.free.push(buffer).is_err() {
            // more returns than members: a frame was duplicated somewhere
            log::error!("frame pool overfull, dropping buffer");
        }
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        if self.waiting.load(Ordering::SeqCst) > 0 {
            let _guard = self.waiters.lock();
            self.returned.notify_one();
        }
    }
}

/// Bounded set of pre-allocated frame buffers
#[derive(Clone)]
pub struct FramePool {
    shared: Arc<PoolShared>,
}

impl FramePool {
    /// Pool of `count` buffers of `buffer_size` bytes each
    pub fn new(count: usize, buffer_size: usize) -> Self {
        let count = count.max(1);
        let free = ArrayQueue::new(count);
        for _ in 0..count {
            let _ = free.push(vec![0u8; buffer_size]);
        }
        log::debug!("frame pool: {} x {} bytes", count, buffer_size);
        Self {
            shared: Arc::new(PoolShared {
                free,
                members: AtomicUsize::new(count),
                outstanding: AtomicUsize::new(0),
                buffer_size: AtomicUsize::new(buffer_size),
                resize: Mutex::new(()),
                waiting: AtomicUsize::new(0),
                waiters: Mutex::new(()),
                returned: Condvar::new(),
            }),
        }
    }

    /// Number of frames belonging to the pool
    pub fn capacity(&self) -> usize {
        self.shared.members.load(Ordering::Acquire)
    }

    /// Size of every buffer
    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size.load(Ordering::Acquire)
    }

    /// Frames currently held outside the pool
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Frames currently free
    pub fn available(&self) -> usize {
        self.shared.free.len()
    }

    /// Claim a free frame without waiting
    pub fn try_claim(&self) -> Result<Frame, PoolError> {
        let shared = &self.shared;
        // count first so that resize never sees a popped buffer as free
        shared.outstanding.fetch_add(1, Ordering::AcqRel);
        match shared.free.pop() {
            Some(buffer) => Ok(Frame {
                buffer,
                pool: Arc::downgrade(shared),
                offset: 0,
                size: 0,
                status: 0,
                state: FrameState::Filling,
            }),
            None => {
                shared.outstanding.fetch_sub(1, Ordering::AcqRel);
                Err(PoolError::Exhausted)
            }
        }
    }

    /// Claim a free frame, waiting up to `timeout` for one to be returned
    pub fn claim(&self, timeout: Duration) -> Result<Frame, PoolError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(frame) = self.try_claim() {
                return Ok(frame);
            }

            let shared = &self.shared;
            let mut guard = shared.waiters.lock();
            shared.waiting.fetch_add(1, Ordering::SeqCst);
            let timed_out = shared.free.is_empty()
                && shared.returned.wait_until(&mut guard, deadline).timed_out();
            shared.waiting.fetch_sub(1, Ordering::SeqCst);
            drop(guard);

            if timed_out {
                return self.try_claim();
            }
        }
    }

    /// Reallocate every buffer with `new_size` bytes
    ///
    /// Fails with [`PoolError::Busy`] while any frame is outstanding.
    pub fn resize_buffer(&self, new_size: usize) -> Result<(), PoolError> {
        let shared = &self.shared;
        let _resize = shared.resize.lock();

        let outstanding = shared.outstanding.load(Ordering::Acquire);
        if outstanding > 0 {
            return Err(PoolError::Busy { outstanding });
        }

        let members = shared.members.load(Ordering::Acquire);
        let mut drained = Vec::with_capacity(members);
        while let Some(buffer) = shared.free.pop() {
            drained.push(buffer);
        }
        if drained.len() != members {
            // a claim raced with us
            let outstanding = members - drained.len();
            for buffer in drained {
                let _ = shared.free.push(buffer);
            }
            return Err(PoolError::Busy { outstanding });
        }

        shared.buffer_size.store(new_size, Ordering::Release);
        for _ in 0..members {
            let _ = shared.free.push(vec![0u8; new_size]);
        }
        // claimers that found the queue drained by us
        {
            let _guard = shared.waiters.lock();
            shared.returned.notify_all();
        }
        log::debug!("frame pool: resized to {} x {} bytes", members, new_size);
        Ok(())
    }
}

impl core::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FramePool")
            .field("capacity", &self.capacity())
            .field("buffer_size", &self.buffer_size())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_claim_until_exhausted() {
        let pool = FramePool::new(2, 64);
        let a = pool.try_claim().unwrap();
        let b = pool.try_claim().unwrap();
        assert_eq!(pool.try_claim().unwrap_err(), PoolError::Exhausted);
        assert_eq!(pool.outstanding(), 2);
        assert_eq!(a.state(), FrameState::Filling);

        a.queue();
        b.release();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_set_data_bounds() {
        let pool = FramePool::new(1, 16);
        let mut frame = pool.try_claim().unwrap();
        frame.buffer_mut()[4..8].copy_from_slice(&[1, 2, 3, 4]);
        frame.set_data(4, 4).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3, 4]);
        assert_eq!(
            frame.set_data(10, 7),
            Err(PoolError::OutOfBounds { end: 17, capacity: 16 })
        );
        assert_eq!(frame.data_offset(), 4);
    }

    #[test]
    fn test_resize_busy_while_outstanding() {
        let pool = FramePool::new(3, 32);
        let frame = pool.try_claim().unwrap();
        assert_eq!(
            pool.resize_buffer(128),
            Err(PoolError::Busy { outstanding: 1 })
        );
        assert_eq!(pool.buffer_size(), 32);

        drop(frame);
        pool.resize_buffer(128).unwrap();
        let frames: Vec<_> = (0..3).map(|_| pool.try_claim().unwrap()).collect();
        assert!(frames.iter().all(|f| f.capacity() == 128));
    }

    #[test]
    fn test_resize_wakes_blocked_claimer() {
        const CLAIMS: usize = 300;
        let pool = FramePool::new(1, 8);
        let claimer = {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut slowest = Duration::ZERO;
                for _ in 0..CLAIMS {
                    let start = Instant::now();
                    let frame = pool.claim(Duration::from_secs(5)).unwrap();
                    slowest = slowest.max(start.elapsed());
                    drop(frame);
                }
                slowest
            })
        };

        // a claimer that finds the queue drained mid-resize must not sleep
        // until its deadline
        while !claimer.is_finished() {
            let size = if pool.buffer_size() == 8 { 16 } else { 8 };
            let _ = pool.resize_buffer(size);
        }
        let slowest = claimer.join().unwrap();
        assert!(slowest < Duration::from_secs(1), "claim stalled for {slowest:?}");
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_queue_after_pool_dropped_is_noop() {
        let pool = FramePool::new(1, 8);
        let frame = pool.try_claim().unwrap();
        drop(pool);
        assert!(!frame.is_pooled());
        frame.queue();
    }

    #[test]
    fn test_unpool_detaches_and_shrinks() {
        let pool = FramePool::new(2, 8);
        let mut frame = pool.try_claim().unwrap();
        frame.unpool();
        assert!(!frame.is_pooled());
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.capacity(), 1);
        drop(frame);
        assert_eq!(pool.available(), 1);
        pool.resize_buffer(16).unwrap();
    }

    #[test]
    fn test_claim_waits_for_return() {
        let pool = FramePool::new(1, 8);
        let held = pool.try_claim().unwrap();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.claim(Duration::from_secs(5)).map(|f| f.capacity()))
        };
        thread::sleep(Duration::from_millis(20));
        drop(held);
        assert_eq!(waiter.join().unwrap(), Ok(8));
    }

    #[test]
    fn test_claim_times_out() {
        let pool = FramePool::new(1, 8);
        let _held = pool.try_claim().unwrap();
        let start = Instant::now();
        assert_eq!(
            pool.claim(Duration::from_millis(20)).unwrap_err(),
            PoolError::Exhausted
        );
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cycles_beyond_capacity() {
        const CAPACITY: usize = 4;
        const CYCLES: usize = 1000;
        let pool = FramePool::new(CAPACITY, 32);
        let (tx, rx) = crossbeam::channel::bounded::<Frame>(CAPACITY);

        let consumer = thread::spawn(move || {
            let mut seen = 0usize;
            for mut frame in rx {
                assert_eq!(frame.state(), FrameState::Ready);
                frame.set_state(FrameState::Consumed);
                assert_eq!(frame.data()[0] as usize, seen % 256);
                seen += 1;
                frame.queue();
            }
            seen
        });

        for i in 0..CYCLES {
            let mut frame = pool.claim(Duration::from_secs(5)).unwrap();
            frame.buffer_mut()[0] = (i % 256) as u8;
            frame.set_data(0, 1).unwrap();
            frame.set_state(FrameState::Ready);
            tx.send(frame).unwrap();
            assert!(pool.outstanding() <= CAPACITY);
        }
        drop(tx);

        assert_eq!(consumer.join().unwrap(), CYCLES);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), CAPACITY);
    }
}
