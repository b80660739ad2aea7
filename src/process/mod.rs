//! Processing functionality for DTS elementary streams.
//!
//! 1. **Frame Assembly** ([`extract`]): Reassembles complete audio frames
//!    from arbitrarily chunked input using sync-word detection.
//!
//! 2. **Header Parsing** ([`parse`]): Derives the stream format and frame
//!    timing from Core and extension substream headers.

use crate::structs::format::StreamFormat;

/// Frame assembly from chunked byte feeds.
///
/// Provides the [`FrameAssembler`](extract::FrameAssembler) for locating
/// frame boundaries and dispatching frame payloads with timing metadata.
pub mod extract;

/// Frame-header decoding.
///
/// Provides [`parse_frame`](parse::parse_frame) for turning an assembled
/// frame into a [`FrameInfo`](parse::FrameInfo).
pub mod parse;

/// Flag set on the metadata of every emitted frame: DTS frames are
/// self-contained sync points.
pub const SAMPLE_FLAG_SYNC: u32 = 1;

/// Sink for the frames and format produced by a
/// [`FrameAssembler`](extract::FrameAssembler).
///
/// For every frame, the payload arrives through [`sample_data`] before the
/// [`sample_metadata`] call that finalizes it, and a frame is finalized
/// before any byte of the next one is delivered.
///
/// [`sample_data`]: SampleOutput::sample_data
/// [`sample_metadata`]: SampleOutput::sample_metadata
pub trait SampleOutput {
    /// Called once per stream, before the first frame is finalized.
    fn announce_format(&mut self, format: StreamFormat);

    /// Appends payload bytes to the frame currently being emitted.
    fn sample_data(&mut self, data: &[u8]);

    /// Finalizes the current frame with its presentation time in
    /// microseconds, flags, payload size and offset.
    fn sample_metadata(&mut self, pts_us: i64, flags: u32, size: usize, offset: usize);
}
