//! Timeline Engine (C8): segment lookup, HLS-style manifest generation, and
//! continuous fragmented-MP4 assembly over a subprocess pipe (spec.md §4.6).
//!
//! Grounded on the teacher's `proxy` module: `query` is the segment-overlap
//! read underlying both `manifest` and `playback`, `manifest` mirrors the
//! teacher's scratch-file-then-serve idiom for generated playlists, and
//! `playback` mirrors its chunked subprocess-to-HTTP streaming.

pub mod manifest;
pub mod playback;
pub mod query;

pub use manifest::{ManifestError, build_manifest};
pub use playback::{PlaybackError, PlaybackSession};
pub use query::{DEFAULT_LIMIT, list};
