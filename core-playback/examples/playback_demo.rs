//! # Streaming Playback Demo
//!
//! Streams a FLAC URL through the full pipeline (fetch, decode, format
//! negotiation, sample conversion) into a discarding sink, printing playback
//! events as they arrive.
//!
//! Run with: `cargo run --example playback_demo --package core-playback -- <flac-url>`

use async_trait::async_trait;
use catalog_traits::{ByteStream, CatalogError, Media, MediaPart, NullPanel, StreamSource, TrackItem};
use core_playback::{NullSink, PlaybackConfig, PlaybackController, PlaybackEvent};
use core_runtime::logging::{init_logging, LoggingConfig};
use futures_util::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::io::StreamReader;

/// Stands in for the catalog client: treats the part key as a plain URL and
/// hands back the open response body.
struct UrlSource {
    client: reqwest::Client,
}

#[async_trait]
impl StreamSource for UrlSource {
    async fn open_stream(&self, key: &str) -> Result<ByteStream, CatalogError> {
        let response = self
            .client
            .get(key)
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Rejected {
                status: response.status().as_u16(),
                message: key.to_string(),
            });
        }

        let stream = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();
        Ok(Box::new(StreamReader::new(stream)))
    }
}

fn single_part_track(url: &str) -> TrackItem {
    TrackItem {
        title: url.to_string(),
        grandparent_title: None,
        parent_title: None,
        duration: None,
        media: vec![Media {
            parts: vec![MediaPart {
                container: "flac".to_string(),
                key: url.to_string(),
                size: None,
                streams: Vec::new(),
            }],
        }],
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default())?;

    let url = std::env::args()
        .nth(1)
        .expect("usage: playback_demo <flac-url>");

    let source = Arc::new(UrlSource {
        client: reqwest::Client::new(),
    });
    let mut controller = PlaybackController::new(
        source,
        Arc::new(NullPanel),
        Box::new(NullSink::new()),
        PlaybackConfig::default(),
    )?;

    let mut events = controller.subscribe();
    controller.play(&single_part_track(&url)).await?;

    loop {
        match events.recv().await? {
            PlaybackEvent::TrackStarted { title, .. } => println!("Playing: {}", title),
            PlaybackEvent::TrackFinished => {
                println!("Finished");
                break;
            }
            PlaybackEvent::PlaybackFailed { message } => anyhow::bail!(message),
            PlaybackEvent::Stopped => break,
        }
    }

    Ok(())
}
