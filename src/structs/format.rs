//! Stream format description announced for a parsed elementary stream.

/// Maximum size of a single DTS audio frame, in bytes.
pub const MAX_FRAME_SIZE: usize = 32768;

/// MIME type for DTS audio.
pub const MIME_TYPE: &str = "audio/vnd.dts";

/// Private codec tag for DTS core audio.
pub const CODEC_TAG: &str = "dtsc";

/// Maximum rate for a DTS audio stream, in bytes per second.
///
/// DTS allows an open bitrate, but we assume the maximum listed value:
/// 1536 kbit/s.
pub const DTS_MAX_RATE_BYTES_PER_SECOND: u32 = 1536 * 1000 / 8;

/// Maximum rate for a DTS-HD audio stream, in bytes per second.
pub const DTS_HD_MAX_RATE_BYTES_PER_SECOND: u32 = 18000 * 1000 / 8;

/// Audio format derived from the first successfully parsed frame header.
///
/// Announced to the output exactly once per stream and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channel_count: u32,
    pub sample_count: u32,
    pub bits_per_sample: u32,
    pub codec_tag: &'static str,
    pub mime_type: &'static str,
    pub max_frame_size: usize,
    pub language: String,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channel_count: u32, sample_count: u32, language: &str) -> Self {
        Self {
            sample_rate,
            channel_count,
            sample_count,
            bits_per_sample: 16,
            codec_tag: CODEC_TAG,
            mime_type: MIME_TYPE,
            max_frame_size: MAX_FRAME_SIZE,
            language: language.to_owned(),
        }
    }
}
