//! Receive loop feeding pooled frames to the application

use super::{Frame, FramePool, FrameState};
use crate::error::{Error, LinkError, PoolError, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Placement of one received frame inside the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// Offset of the first data byte
    pub offset: usize,
    /// Number of data bytes
    pub size: usize,
    /// Status reported by the device
    pub status: u32,
}

/// Producer side of a data channel
pub trait FrameSource: Send {
    /// Receive one frame into `buf`
    ///
    /// Blocks for a bounded time; returns [`LinkError::Timeout`] when no
    /// frame arrived and [`LinkError::Closed`] once the channel is closed.
    fn receive_frame(&mut self, buf: &mut [u8]) -> core::result::Result<FrameInfo, LinkError>;
}

/// What the receiver does when every frame is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Stop reading until the consumer returns a frame
    #[default]
    Block,
    /// Keep reading and discard incoming frames
    Drop,
}

/// Stream settings
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Buffer size of every frame
    pub frame_size: usize,
    /// Number of frames in the pool
    pub frame_count: usize,
    /// Behaviour when the pool is exhausted
    pub overflow: OverflowPolicy,
    /// Poll interval of the receive loop while blocked on the pool
    pub claim_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_size: 64 * 1024,
            frame_count: 8,
            overflow: OverflowPolicy::Block,
            claim_timeout: Duration::from_millis(100),
        }
    }
}

/// Counters of a running stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// Frames delivered to the ready queue
    pub received: u64,
    /// Frames discarded because the pool was exhausted
    pub dropped: u64,
}

#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    received: AtomicU64,
    dropped: AtomicU64,
    error: Mutex<Option<LinkError>>,
}

/// Receive loop thread plus the queue of ready frames
pub struct StreamReceiver {
    pool: FramePool,
    ready: Receiver<Frame>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl StreamReceiver {
    /// Start receiving from `source` into a new pool built from `config`
    pub fn start(source: Box<dyn FrameSource>, config: &StreamConfig) -> Result<Self> {
        let pool = FramePool::new(config.frame_count, config.frame_size);
        Self::with_pool(source, pool, config)
    }

    /// Start receiving from `source` into an existing pool
    pub fn with_pool(
        source: Box<dyn FrameSource>,
        pool: FramePool,
        config: &StreamConfig,
    ) -> Result<Self> {
        let (tx, ready) = channel::bounded(pool.capacity());
        let shared = Arc::new(Shared::default());

        let worker = {
            let pool = pool.clone();
            let shared = shared.clone();
            let policy = config.overflow;
            let claim_timeout = config.claim_timeout;
            thread::Builder::new()
                .name("radarlink-rx".into())
                .spawn(move || receive_loop(source, pool, tx, shared, policy, claim_timeout))
                .map_err(|e| {
                    log::error!("failed to spawn receive thread: {}", e);
                    Error::from(LinkError::Unavailable)
                })?
        };
        log::info!(
            "stream started: {} frames of {} bytes, {:?} on overflow",
            pool.capacity(),
            pool.buffer_size(),
            config.overflow
        );

        Ok(Self {
            pool,
            ready,
            shared,
            worker: Some(worker),
        })
    }

    /// Wait up to `timeout` for the next filled frame
    ///
    /// Fails with [`LinkError::Timeout`] if none arrived, or with the error
    /// that ended the receive loop once every queued frame was taken.
    pub fn next_frame(&self, timeout: Duration) -> Result<Frame> {
        match self.ready.recv_timeout(timeout) {
            Ok(mut frame) => {
                frame.set_state(FrameState::Consumed);
                Ok(frame)
            }
            Err(RecvTimeoutError::Timeout) => Err(LinkError::Timeout.into()),
            Err(RecvTimeoutError::Disconnected) => {
                let error = (*self.shared.error.lock()).unwrap_or(LinkError::Closed);
                Err(error.into())
            }
        }
    }

    /// Pool the frames come from
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Counters so far
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            received: self.shared.received.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    /// Whether the receive loop is still running
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the receive loop and wait for it
    ///
    /// Frames already handed out stay valid.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("receive thread panicked");
            }
            let stats = self.stats();
            log::info!(
                "stream stopped: {} received, {} dropped",
                stats.received,
                stats.dropped
            );
        }
    }
}

impl Drop for StreamReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    mut source: Box<dyn FrameSource>,
    pool: FramePool,
    ready: Sender<Frame>,
    shared: Arc<Shared>,
    policy: OverflowPolicy,
    claim_timeout: Duration,
) {
    let mut scratch = Vec::new();

    while !shared.stop.load(Ordering::Acquire) {
        let claimed = match policy {
            OverflowPolicy::Block => pool.claim(claim_timeout),
            OverflowPolicy::Drop => pool.try_claim(),
        };

        let mut frame = match claimed {
            Ok(frame) => frame,
            Err(PoolError::Exhausted) if policy == OverflowPolicy::Block => continue,
            Err(_) => {
                scratch.resize(pool.buffer_size(), 0);
                match source.receive_frame(&mut scratch) {
                    Ok(_) => {
                        let dropped = shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        log::warn!("frame pool exhausted, dropped frame ({} total)", dropped);
                        continue;
                    }
                    Err(LinkError::Timeout) => continue,
                    Err(e) => {
                        finish(&shared, e);
                        return;
                    }
                }
            }
        };

        match source.receive_frame(frame.buffer_mut()) {
            Ok(info) => {
                if let Err(e) = frame.set_data(info.offset, info.size) {
                    log::warn!("discarding frame with bad placement: {}", e);
                    continue;
                }
                frame.set_status(info.status);
                frame.set_state(FrameState::Ready);
                shared.received.fetch_add(1, Ordering::Relaxed);
                if ready.send(frame).is_err() {
                    return;
                }
            }
            Err(LinkError::Timeout) => continue,
            Err(e) => {
                finish(&shared, e);
                return;
            }
        }
    }
}

fn finish(shared: &Shared, error: LinkError) {
    if error != LinkError::Closed {
        log::warn!("receive loop ended: {}", error);
    } else {
        log::debug!("receive loop ended: link closed");
    }
    *shared.error.lock() = Some(error);
}
