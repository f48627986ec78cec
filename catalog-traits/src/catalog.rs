//! Catalog Item Model
//!
//! The remote library hands tracks to the player as a small hierarchy:
//! a track owns media renditions, a rendition owns parts, and a part names
//! the container format plus the key that resolves to a streamable URL.
//! The field and collection names mirror the JSON the catalog server emits,
//! which is why the nested collections are capitalized in serde attributes.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// An already-open stream of response bytes, handed to the playback core by
/// the catalog client. The core never issues the HTTP request itself.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// One playable track as listed by the remote catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackItem {
    pub title: String,

    /// Artist-level title in the library hierarchy.
    #[serde(default)]
    pub grandparent_title: Option<String>,

    /// Album-level title in the library hierarchy.
    #[serde(default)]
    pub parent_title: Option<String>,

    /// Track duration in milliseconds, as reported by the catalog.
    #[serde(default)]
    pub duration: Option<u64>,

    #[serde(rename = "Media", default)]
    pub media: Vec<Media>,
}

impl TrackItem {
    /// "Artist - Album - Title" line for the UI, skipping absent levels.
    pub fn display_title(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(t) = self.grandparent_title.as_deref() {
            parts.push(t);
        }
        if let Some(t) = self.parent_title.as_deref() {
            parts.push(t);
        }
        parts.push(&self.title);
        parts.join(" - ")
    }

    /// Iterate all parts across every media rendition, in catalog order.
    pub fn parts(&self) -> impl Iterator<Item = &MediaPart> {
        self.media.iter().flat_map(|m| m.parts.iter())
    }
}

/// One media rendition of a track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "Part", default)]
    pub parts: Vec<MediaPart>,
}

/// One streamable part of a media rendition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPart {
    /// Container format tag, e.g. `"flac"`. Selects the decode engine.
    pub container: String,

    /// Catalog key resolvable to a streamable URL.
    pub key: String,

    /// Part size in bytes, when the catalog knows it.
    #[serde(default)]
    pub size: Option<u64>,

    #[serde(rename = "Stream", default)]
    pub streams: Vec<StreamHint>,
}

impl MediaPart {
    /// The declared audio stream parameters, if the catalog listed any.
    ///
    /// Only a hint. The decode engine's own metadata probe is authoritative.
    pub fn audio_hint(&self) -> Option<&StreamHint> {
        self.streams.iter().find(|s| s.stream_type == AUDIO_STREAM_TYPE)
    }
}

/// Catalog stream-type tag for audio streams.
pub const AUDIO_STREAM_TYPE: u32 = 2;

/// Per-stream parameters declared by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamHint {
    #[serde(default)]
    pub stream_type: u32,

    #[serde(default)]
    pub sampling_rate: Option<u32>,

    #[serde(default)]
    pub channels: Option<u16>,
}

/// Everything the playback core needs to start one playback attempt.
///
/// Immutable once created; lives for exactly one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Container format tag of the selected part.
    pub container: String,
    /// Key the catalog client resolves to the stream URL.
    pub key: String,
    /// Total byte length, when known up front.
    pub byte_length: Option<u64>,
}

impl StreamDescriptor {
    pub fn from_part(part: &MediaPart) -> Self {
        Self {
            container: part.container.clone(),
            key: part.key.clone(),
            byte_length: part.size,
        }
    }
}

/// Resolves part keys to open byte streams.
///
/// Implemented by the out-of-scope catalog client. The returned stream is the
/// body of an already-issued HTTP request; the playback core only drains it.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open_stream(&self, key: &str) -> Result<ByteStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_item_deserializes_catalog_json() {
        let json = r#"{
            "title": "Baba O'Riley",
            "grandparentTitle": "The Who",
            "parentTitle": "Who's Next",
            "duration": 300100,
            "Media": [{
                "Part": [{
                    "container": "flac",
                    "key": "/library/parts/1077/file.flac",
                    "size": 31460000,
                    "Stream": [
                        {"streamType": 2, "samplingRate": 44100, "channels": 2}
                    ]
                }]
            }]
        }"#;

        let item: TrackItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.display_title(), "The Who - Who's Next - Baba O'Riley");
        assert_eq!(item.duration, Some(300100));

        let part = item.parts().next().unwrap();
        assert_eq!(part.container, "flac");

        let hint = part.audio_hint().unwrap();
        assert_eq!(hint.sampling_rate, Some(44100));
        assert_eq!(hint.channels, Some(2));

        let descriptor = StreamDescriptor::from_part(part);
        assert_eq!(descriptor.key, "/library/parts/1077/file.flac");
        assert_eq!(descriptor.byte_length, Some(31460000));
    }

    #[test]
    fn display_title_skips_missing_levels() {
        let item = TrackItem {
            title: "Untagged".to_string(),
            grandparent_title: None,
            parent_title: None,
            duration: None,
            media: Vec::new(),
        };
        assert_eq!(item.display_title(), "Untagged");
    }

    #[test]
    fn audio_hint_ignores_non_audio_streams() {
        let part = MediaPart {
            container: "flac".to_string(),
            key: "/k".to_string(),
            size: None,
            streams: vec![
                StreamHint { stream_type: 1, sampling_rate: None, channels: None },
                StreamHint { stream_type: 2, sampling_rate: Some(48000), channels: Some(2) },
            ],
        };
        assert_eq!(part.audio_hint().unwrap().sampling_rate, Some(48000));
    }
}
