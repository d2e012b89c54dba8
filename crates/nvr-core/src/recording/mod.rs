//! Recording Consumer (spec.md §4.5): one muxer subprocess per enabled
//! stream, closing segments into the Segment Catalog on rollover or stop.

pub mod consumer;

pub use consumer::RecordingConsumer;
