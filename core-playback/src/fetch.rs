//! # Stream Fetcher
//!
//! Producer side of the pipeline: drains the already-open response stream in
//! fixed-size chunks and enqueues them into the [`TrackBuffer`], so network
//! latency never stalls decode or playback setup.
//!
//! Network failures are absorbed here. The loop logs them, records them on
//! the session's side channel, and ends the buffer so the decode side treats
//! the truncation as an ordinary end of stream.

use crate::track_buffer::TrackBuffer;
use bytes::Bytes;
use catalog_traits::ByteStream;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How long the fetcher naps while the buffer sits above its watermark.
const WATERMARK_NAP: Duration = Duration::from_millis(20);

/// Fetch loop for one stream. One instance per playback session.
///
/// Cancellation is checked before every enqueue. On cancellation the loop
/// returns without an end marker; the consumer side observes cancellation
/// independently through the buffer abort.
pub async fn run(
    mut stream: ByteStream,
    buffer: Arc<TrackBuffer>,
    cancel: CancellationToken,
    chunk_bytes: usize,
    max_buffered_bytes: usize,
    error_slot: Arc<Mutex<Option<String>>>,
) {
    let mut chunk = vec![0u8; chunk_bytes];
    let mut total: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!("Fetch cancelled after {} bytes", total);
            return;
        }

        // Backpressure: bound memory when the network outruns the decoder.
        if max_buffered_bytes > 0 && buffer.buffered() >= max_buffered_bytes {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(WATERMARK_NAP) => continue,
            }
        }

        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Fetch cancelled after {} bytes", total);
                return;
            }
            r = stream.read(&mut chunk) => r,
        };

        match read {
            Ok(0) => {
                debug!("Stream exhausted after {} bytes", total);
                buffer.append_end();
                return;
            }
            Ok(n) => {
                if cancel.is_cancelled() {
                    return;
                }
                total += n as u64;
                trace!("Fetched {} bytes ({} total)", n, total);
                buffer.append(Bytes::copy_from_slice(&chunk[..n]));
            }
            Err(e) => {
                // Not a playback error: let the decoder drain what arrived
                // and finish on the truncated stream.
                warn!("Stream fetch failed after {} bytes, ending stream: {}", total, e);
                *error_slot.lock() = Some(e.to_string());
                buffer.append_end();
                return;
            }
        }
    }
}
