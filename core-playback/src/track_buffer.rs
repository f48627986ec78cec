//! # Track Buffer
//!
//! A thread-safe byte queue bridging the network fetcher (producer) and the
//! decode engine's pull-based read callback (consumer).
//!
//! ## Design
//!
//! - Ordered FIFO of byte chunks; consumed bytes are never retained.
//! - An explicit end marker distinguishes "no more bytes will ever arrive"
//!   from "no bytes currently available".
//! - Single producer, single consumer. The only blocking point is the
//!   consumer waiting on "data available or end of stream" (a condvar wait,
//!   never a spin loop).
//! - `abort` permanently drains the consumer side so a cancelled session can
//!   never leave the decode thread parked on the condvar.
//!
//! ```text
//! ┌───────────────┐  append / append_end   ┌─────────────┐
//! │ StreamFetcher ├───────────────────────>│ TrackBuffer │
//! └───────────────┘                        └──────┬──────┘
//!                                                 │ take (blocking)
//!                                                 ▼
//!                                   ┌──────────────────────────┐
//!                                   │ DecodeEngine read callback│
//!                                   └──────────────────────────┘
//! ```

use bytes::{Buf, Bytes};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;

pub struct TrackBuffer {
    inner: Mutex<Inner>,
    data_ready: Condvar,
}

struct Inner {
    chunks: VecDeque<Bytes>,
    buffered: usize,
    ended: bool,
    aborted: bool,
}

impl TrackBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                chunks: VecDeque::new(),
                buffered: 0,
                ended: false,
                aborted: false,
            }),
            data_ready: Condvar::new(),
        }
    }

    /// Enqueue one chunk of stream bytes.
    ///
    /// Chunks appended after `abort` are dropped; the session they belonged
    /// to is already gone.
    pub fn append(&self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.aborted || inner.ended {
            return;
        }
        inner.buffered += chunk.len();
        inner.chunks.push_back(chunk);
        self.data_ready.notify_one();
    }

    /// Mark that no more bytes will arrive. Remaining chunks stay readable.
    pub fn append_end(&self) {
        let mut inner = self.inner.lock();
        inner.ended = true;
        self.data_ready.notify_all();
    }

    /// Cancel the buffer: discard unconsumed bytes and wake the consumer.
    ///
    /// All subsequent `take` calls return 0 immediately.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.aborted = true;
        inner.chunks.clear();
        inner.buffered = 0;
        self.data_ready.notify_all();
    }

    /// Dequeue up to `out.len()` bytes, in append order.
    ///
    /// Blocks only while the buffer is empty and neither the end marker nor
    /// an abort has been seen. Once data is available it drains what is there
    /// without further blocking, so a short read does not imply end of
    /// stream. Returns 0 only after the end marker with the buffer drained,
    /// or after an abort.
    pub fn take(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }

        let mut inner = self.inner.lock();
        while inner.chunks.is_empty() && !inner.ended && !inner.aborted {
            self.data_ready.wait(&mut inner);
        }
        if inner.aborted {
            return 0;
        }

        let mut copied = 0;
        while copied < out.len() {
            let Some(chunk) = inner.chunks.front_mut() else {
                break;
            };
            let n = (out.len() - copied).min(chunk.len());
            out[copied..copied + n].copy_from_slice(&chunk[..n]);
            copied += n;
            if n == chunk.len() {
                inner.chunks.pop_front();
            } else {
                chunk.advance(n);
            }
            inner.buffered -= n;
        }
        copied
    }

    /// Bytes currently held, for the fetcher's watermark check.
    pub fn buffered(&self) -> usize {
        self.inner.lock().buffered
    }

    /// Returns `true` once the end marker has been appended.
    pub fn is_ended(&self) -> bool {
        self.inner.lock().ended
    }
}

impl Default for TrackBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking `Read` view of a [`TrackBuffer`] for handing to a decode engine.
///
/// A read returning 0 bytes means end of stream to the engine, which is
/// exactly what the buffer reports after the end marker or an abort.
pub struct TrackBufferReader {
    buffer: Arc<TrackBuffer>,
}

impl TrackBufferReader {
    pub fn new(buffer: Arc<TrackBuffer>) -> Self {
        Self { buffer }
    }
}

impl Read for TrackBufferReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.buffer.take(buf))
    }
}
