//! Boundary contracts between the playback core and its external
//! collaborators.
//!
//! The playback core does not browse the remote library and does not render a
//! UI. Both live behind the traits declared here:
//!
//! - [`catalog`]: the shape of a streamable track as delivered by the remote
//!   catalog client, plus [`catalog::StreamSource`] for turning a part key
//!   into an open byte stream.
//! - [`panel`]: the notification surface of the terminal UI.
//!
//! Host applications implement these traits; the core only consumes them.

pub mod catalog;
pub mod error;
pub mod panel;

pub use catalog::{ByteStream, Media, MediaPart, StreamDescriptor, StreamHint, StreamSource, TrackItem};
pub use error::{CatalogError, Result};
pub use panel::{NullPanel, PlayerPanel};
