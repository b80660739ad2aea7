use std::borrow::Cow;

use anyhow::{Result, bail};

use crate::structs::header::{CoreHeader, ExssHeader};
use crate::structs::sync::{
    SYNC_CORE_14BIT_BE, SYNC_CORE_14BIT_LE, SYNC_CORE_16BIT_BE, SYNC_CORE_16BIT_LE,
    SYNC_EXSS_16BIT_LE, SyncKind,
};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::ParseError;

const FIRST_BYTE_CORE_16BIT_BE: u8 = (SYNC_CORE_16BIT_BE >> 24) as u8;
const FIRST_BYTE_CORE_14BIT_BE: u8 = (SYNC_CORE_14BIT_BE >> 24) as u8;
const FIRST_BYTE_CORE_16BIT_LE: u8 = (SYNC_CORE_16BIT_LE >> 24) as u8;
const FIRST_BYTE_CORE_14BIT_LE: u8 = (SYNC_CORE_14BIT_LE >> 24) as u8;
const FIRST_BYTE_EXSS_16BIT_LE: u8 = (SYNC_EXSS_16BIT_LE >> 24) as u8;

/// Stream parameters derived from one frame header.
///
/// Pure result of [`parse_frame`]; the frame assembler owns the value and
/// carries it forward, no parser state survives the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub sample_rate: u32,
    pub channel_count: u32,
    pub sample_count: u32,
    pub frame_duration_us: i64,
}

/// Decodes the header of an assembled frame into a [`FrameInfo`].
///
/// The frame may be in any of the six storage variants; it is normalized
/// to 16-bit big-endian first. Core frames (including a Core frame with a
/// trailing extension substream) take their parameters from the Core
/// header, standalone extension substream frames from the ExSS header.
pub fn parse_frame(frame: &[u8]) -> Result<FrameInfo> {
    let normalized = normalized_frame_header(frame);
    let reader = &mut BsIoSliceReader::from_slice(&normalized);

    let sync_word = reader.get_n::<u32>(32)?;
    let (sample_rate, channel_count, sample_count) = match SyncKind::from_word(sync_word) {
        Some(kind) if kind.is_core() => {
            let header = CoreHeader::read(reader)?;
            (
                header.sample_rate(),
                header.channel_count(),
                header.sample_count(),
            )
        }
        Some(_) => {
            let header = ExssHeader::read(reader)?;
            (header.sample_rate, header.channel_count, header.sample_count())
        }
        None => bail!(ParseError::InvalidSyncWord(sync_word)),
    };

    // Clamp decoded values to the channel layouts and rates a DTS stream
    // can actually carry before deriving the frame duration.
    let channel_count = if channel_count == 0 || (channel_count > 2 && channel_count < 6) {
        6
    } else if channel_count > 6 && channel_count != 8 {
        8
    } else {
        channel_count
    };
    let sample_rate = if sample_rate == 0 { 48000 } else { sample_rate };

    Ok(FrameInfo {
        sample_rate,
        channel_count,
        sample_count,
        frame_duration_us: i64::from(sample_count) * 1_000_000 / i64::from(sample_rate),
    })
}

/// Returns the number of audio samples represented by the given frame,
/// or zero when the frame header cannot be parsed.
pub fn parse_sample_count(frame: &[u8]) -> usize {
    parse_frame(frame).map_or(0, |info| info.sample_count as usize)
}

/// Returns the frame in canonical 16-bit big-endian layout, suitable for
/// direct bit extraction.
///
/// Little-endian storage is fixed by swapping every adjacent byte pair;
/// 14-bit-packed storage is then densified by dropping the two most
/// significant bits of every 16-bit word. Allocates at most one scratch
/// copy of the input window.
pub fn normalized_frame_header(frame: &[u8]) -> Cow<'_, [u8]> {
    if frame.first() == Some(&FIRST_BYTE_CORE_16BIT_BE) {
        // Already 16-bit mode, big endian.
        return Cow::Borrowed(frame);
    }

    let mut header = frame.to_vec();
    if is_little_endian_frame_header(&header) {
        for pair in header.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }
    if header.first() == Some(&FIRST_BYTE_CORE_14BIT_BE) {
        header = repack_14bit(&header);
    }

    Cow::Owned(header)
}

fn is_little_endian_frame_header(frame: &[u8]) -> bool {
    matches!(
        frame.first(),
        Some(&FIRST_BYTE_CORE_16BIT_LE) | Some(&FIRST_BYTE_CORE_14BIT_LE)
            | Some(&FIRST_BYTE_EXSS_16BIT_LE)
    )
}

/// Concatenates the low 14 bits of every 16-bit big-endian word into a
/// dense bitstream.
fn repack_14bit(header: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(header.len() * 14 / 16 + 1);
    let mut acc = 0u32;
    let mut bits = 0u32;

    for word in header.chunks_exact(2) {
        acc = (acc << 14) | u32::from(u16::from_be_bytes([word[0], word[1]]) & 0x3FFF);
        bits += 14;
        while bits >= 8 {
            bits -= 8;
            packed.push((acc >> bits) as u8);
        }
    }
    if bits > 0 {
        packed.push((acc << (8 - bits)) as u8);
    }

    packed
}

// 48 kHz stereo Core frame header: NBLKS=5, AMODE=1, SFREQ=13, LFF=0
#[cfg(test)]
const CORE_FRAME_48K_STEREO: &[u8] = &[
    0x7F, 0xFE, 0x80, 0x01, 0xFC, 0x14, 0x7F, 0xA0, 0x74, 0x00, 0x00,
];

#[test]
fn big_endian_header_passes_through() {
    let normalized = normalized_frame_header(CORE_FRAME_48K_STEREO);
    assert!(matches!(normalized, Cow::Borrowed(_)));
    assert_eq!(normalized.as_ref(), CORE_FRAME_48K_STEREO);
}

#[test]
fn little_endian_header_is_byte_swapped() {
    let wire = [0xFE, 0x7F, 0x01, 0x80, 0x34, 0x12];
    assert_eq!(
        normalized_frame_header(&wire).as_ref(),
        &[0x7F, 0xFE, 0x80, 0x01, 0x12, 0x34]
    );

    let wire = [0x58, 0x64, 0x25, 0x20, 0x34, 0x12];
    assert_eq!(
        normalized_frame_header(&wire).as_ref(),
        &[0x64, 0x58, 0x20, 0x25, 0x12, 0x34]
    );
}

#[test]
fn packed_14bit_header_is_densified() {
    // Each 16-bit word carries 14 significant bits; the dense form of
    // this vector is the 16-bit big-endian sync plus 0x23 0x45 0x67.
    let wire = [0x1F, 0xFF, 0xE8, 0x00, 0x04, 0x8D, 0x05, 0x67];
    assert_eq!(
        normalized_frame_header(&wire).as_ref(),
        &[0x7F, 0xFE, 0x80, 0x01, 0x23, 0x45, 0x67]
    );

    // Same content in little-endian word order
    let wire = [0xFF, 0x1F, 0x00, 0xE8, 0x8D, 0x04, 0x67, 0x05];
    assert_eq!(
        normalized_frame_header(&wire).as_ref(),
        &[0x7F, 0xFE, 0x80, 0x01, 0x23, 0x45, 0x67]
    );
}

#[test]
fn parses_core_frame() {
    let info = parse_frame(CORE_FRAME_48K_STEREO).unwrap();

    assert_eq!(info.sample_rate, 48000);
    assert_eq!(info.channel_count, 2);
    assert_eq!(info.sample_count, 192);
    assert_eq!(info.frame_duration_us, 4000);
}

#[test]
fn clamps_reserved_rate_and_sparse_layouts() {
    // SFREQ=0 is reserved and AMODE=8 maps to 4 channels: both fall back
    // to the 48 kHz / 6 channel defaults.
    let frame = [
        0x7F, 0xFE, 0x80, 0x01, 0xFC, 0x14, 0x7F, 0xA2, 0x00, 0x00, 0x00,
    ];
    let info = parse_frame(&frame).unwrap();

    assert_eq!(info.sample_rate, 48000);
    assert_eq!(info.channel_count, 6);
    assert_eq!(info.frame_duration_us, 4000);
}

#[test]
fn rejects_unknown_sync_and_truncated_frames() {
    assert!(parse_frame(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]).is_err());
    assert!(parse_frame(&CORE_FRAME_48K_STEREO[..5]).is_err());
    assert!(parse_frame(&[]).is_err());
}

#[test]
fn sample_count_helper_defaults_to_zero() {
    assert_eq!(parse_sample_count(CORE_FRAME_48K_STEREO), 192);
    assert_eq!(parse_sample_count(&[0xAA; 16]), 0);
}
