use log::{debug, error, warn};

use crate::process::parse::{self, FrameInfo};
use crate::process::{SAMPLE_FLAG_SYNC, SampleOutput};
use crate::structs::format::{MAX_FRAME_SIZE, StreamFormat};
use crate::structs::sync::{
    FrameKind, SYNC_CORE_16BIT_BE, SYNC_CORE_16BIT_LE, SYNC_EXSS_16BIT_BE, SYNC_EXSS_16BIT_LE,
    ShiftRegister, SyncKind,
};
use crate::utils::errors::ExtractError;

const SYNC_WORD_SIZE: usize = 4;
const EXSS_HEADER_SIZE: usize = 6;
const MAX_EXSS_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssemblerState {
    FindingFirstSync,
    FindingSubsequentSync,
    CheckingExssHeader,
    ReadingExss,
    CopyingFrame,
}

/// Fixed-capacity frame buffer. Once the first sync word is detected the
/// buffer always starts with a sync word.
#[derive(Debug)]
struct FrameBuffer {
    data: Box<[u8]>,
    position: usize,
}

impl FrameBuffer {
    fn new() -> Self {
        Self {
            data: vec![0; MAX_FRAME_SIZE].into_boxed_slice(),
            position: 0,
        }
    }

    fn clear(&mut self) {
        self.position = 0;
    }

    fn is_full(&self) -> bool {
        self.position == self.data.len()
    }

    #[inline(always)]
    fn push(&mut self, byte: u8) {
        self.data[self.position] = byte;
        self.position += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
    }

    fn position(&self) -> usize {
        self.position
    }

    fn bytes(&self) -> &[u8] {
        &self.data[..self.position]
    }
}

/// Collects the `ext_ss_index` of consecutive extension substream headers.
/// A repeated index marks the boundary between standalone ExSS frames.
#[derive(Debug, Default)]
struct ExssAccumulator {
    ids: [u8; MAX_EXSS_COUNT],
    count: usize,
}

impl ExssAccumulator {
    fn push(&mut self, id: u8) {
        if self.count < self.ids.len() {
            self.ids[self.count] = id;
        }
        self.count += 1;
    }

    fn overflowed(&self) -> bool {
        self.count > self.ids.len()
    }

    fn boundary_found(&self) -> bool {
        self.count > 1 && self.count <= self.ids.len() && self.ids[0] == self.ids[self.count - 1]
    }

    fn retain_first(&mut self) {
        self.ids = [self.ids[0], 0, 0, 0];
        self.count = 1;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Reassembles DTS audio frames from a continuous, arbitrarily chunked
/// byte feed and dispatches them to a [`SampleOutput`].
///
/// Frame boundaries are found by sync-word detection over a rolling
/// four-byte window; standalone extension substream streams are delimited
/// by a repeating `ext_ss_index`. The stream format is decoded from the
/// first complete frame and announced once. Damaged input is skipped by
/// resynchronizing on the next sync word; no error reaches the caller.
///
/// # Example
///
/// ```rust,no_run
/// use dtshd::process::{SampleOutput, extract::FrameAssembler};
/// use dtshd::structs::format::StreamFormat;
///
/// struct Printer;
///
/// impl SampleOutput for Printer {
///     fn announce_format(&mut self, format: StreamFormat) {
///         println!("{} Hz, {} channels", format.sample_rate, format.channel_count);
///     }
///     fn sample_data(&mut self, data: &[u8]) {
///         println!("payload chunk: {} bytes", data.len());
///     }
///     fn sample_metadata(&mut self, pts_us: i64, _flags: u32, size: usize, _offset: usize) {
///         println!("frame: {size} bytes at {pts_us} us");
///     }
/// }
///
/// let mut assembler = FrameAssembler::new(Printer, "eng");
/// assembler.packet_started(0, 0);
/// let data = std::fs::read("stream.dts")?;
/// assembler.consume(&data);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct FrameAssembler<O: SampleOutput> {
    output: O,
    language: String,

    state: AssemblerState,
    register: ShiftRegister,
    first_sync: u32,
    frame_kind: FrameKind,
    buffer: FrameBuffer,

    exss_header: [u8; EXSS_HEADER_SIZE],
    exss_header_bytes: usize,
    accumulator: ExssAccumulator,
    sync_bytes_consumed: usize,

    frame_info: Option<FrameInfo>,
    parsed: bool,
    format_announced: bool,
    pts_us: i64,
}

impl<O: SampleOutput> FrameAssembler<O> {
    pub fn new(output: O, language: &str) -> Self {
        Self {
            output,
            language: language.to_owned(),
            state: AssemblerState::FindingFirstSync,
            register: ShiftRegister::default(),
            first_sync: 0,
            frame_kind: FrameKind::StandaloneCore,
            buffer: FrameBuffer::new(),
            exss_header: [0; EXSS_HEADER_SIZE],
            exss_header_bytes: 0,
            accumulator: ExssAccumulator::default(),
            sync_bytes_consumed: 0,
            frame_info: None,
            parsed: false,
            format_announced: false,
            pts_us: 0,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Sets the presentation time for the next emitted frame.
    pub fn packet_started(&mut self, pts_us: i64, _flags: u32) {
        self.pts_us = pts_us;
    }

    pub fn packet_finished(&mut self) {
        // Do nothing.
    }

    /// Discards any partially assembled frame and restarts the sync-word
    /// search. The output binding, language and announced format are kept.
    pub fn seek(&mut self) {
        self.reset();
    }

    /// Drives the state machine over one input chunk. Returns once the
    /// chunk is exhausted; frames completed along the way have been
    /// dispatched to the output in input order.
    pub fn consume(&mut self, chunk: &[u8]) {
        let mut rest = chunk;
        while !rest.is_empty() {
            rest = match self.state {
                AssemblerState::FindingFirstSync => self.find_first_sync(rest),
                AssemblerState::FindingSubsequentSync => self.find_subsequent_sync(rest),
                AssemblerState::CheckingExssHeader => self.check_exss_header(rest),
                AssemblerState::ReadingExss => self.read_exss(rest),
                AssemblerState::CopyingFrame => {
                    self.copy_frame();
                    rest
                }
            };
        }
    }

    fn reset(&mut self) {
        self.state = AssemblerState::FindingFirstSync;
        self.register.reset();
        self.first_sync = 0;
        self.sync_bytes_consumed = 0;
        self.exss_header_bytes = 0;
        self.accumulator.clear();
        self.parsed = false;
        self.buffer.clear();
    }

    /// Reseeds the buffer with the sync word just captured so it opens the
    /// next frame, plus the extension substream header bytes already taken
    /// from the input for a standalone ExSS stream.
    fn reseed_buffer(&mut self) {
        self.buffer.clear();
        self.buffer.extend(&self.register.to_be_bytes());
        if self.frame_kind == FrameKind::StandaloneExss {
            self.buffer.extend(&self.exss_header);
        }
        self.first_sync = self.register.word();
        self.state = AssemblerState::FindingSubsequentSync;
    }

    fn find_first_sync<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        for (consumed, &byte) in chunk.iter().enumerate() {
            let word = self.register.push(byte);
            let Some(kind) = self.register.sync_kind() else {
                continue;
            };

            debug!(
                "Found first sync word {word:#010X} after reading {} bytes",
                consumed + 1
            );
            self.first_sync = word;
            if kind.is_exss() {
                self.frame_kind = FrameKind::StandaloneExss;
                self.state = AssemblerState::CheckingExssHeader;
            } else {
                self.state = AssemblerState::FindingSubsequentSync;
            }

            self.buffer.clear();
            self.buffer.extend(&self.register.to_be_bytes());
            self.sync_bytes_consumed = 0;
            self.exss_header_bytes = 0;
            self.accumulator.clear();

            return &chunk[consumed + 1..];
        }

        &[]
    }

    fn find_subsequent_sync<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        for (consumed, &byte) in chunk.iter().enumerate() {
            if self.buffer.is_full() {
                warn!(
                    "{}, resynchronizing",
                    ExtractError::BufferOverflow(MAX_FRAME_SIZE)
                );
                self.reset();
                return &chunk[consumed..];
            }

            let word = self.register.push(byte);
            self.buffer.push(byte);
            self.sync_bytes_consumed += 1;
            let Some(kind) = self.register.sync_kind() else {
                continue;
            };

            if kind.is_core() && word == self.first_sync {
                self.frame_kind = FrameKind::StandaloneCore;
            }
            if (word == SYNC_EXSS_16BIT_BE && self.first_sync == SYNC_CORE_16BIT_BE)
                || (word == SYNC_EXSS_16BIT_LE && self.first_sync == SYNC_CORE_16BIT_LE)
            {
                self.frame_kind = FrameKind::CorePlusExss;
            }

            debug!(
                "Found sync word {word:#010X} after reading {} bytes, frame layout {:?}",
                self.sync_bytes_consumed, self.frame_kind
            );
            self.sync_bytes_consumed = 0;
            self.state = match self.frame_kind {
                FrameKind::StandaloneCore => AssemblerState::CopyingFrame,
                FrameKind::StandaloneExss | FrameKind::CorePlusExss => {
                    AssemblerState::CheckingExssHeader
                }
            };

            return &chunk[consumed + 1..];
        }

        &[]
    }

    /// Captures the six header bytes that follow an extension substream
    /// sync word and records the `ext_ss_index` they carry.
    fn check_exss_header<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        for (consumed, &byte) in chunk.iter().enumerate() {
            if self.buffer.is_full() {
                warn!(
                    "{}, resynchronizing",
                    ExtractError::BufferOverflow(MAX_FRAME_SIZE)
                );
                self.reset();
                return &chunk[consumed..];
            }

            self.buffer.push(byte);
            self.exss_header[self.exss_header_bytes] = byte;
            self.exss_header_bytes += 1;
            if self.exss_header_bytes < EXSS_HEADER_SIZE {
                continue;
            }
            self.exss_header_bytes = 0;

            if self.register.word() == SYNC_EXSS_16BIT_BE {
                // ext_ss_index sits right after the user-defined byte
                self.accumulator.push(self.exss_header[1] >> 6);
            }

            if self.accumulator.overflowed() {
                error!(
                    "{}, resynchronizing",
                    ExtractError::ExssAccumulatorOverflow(MAX_EXSS_COUNT)
                );
                self.reset();
            } else {
                self.state = AssemblerState::ReadingExss;
            }

            return &chunk[consumed + 1..];
        }

        &[]
    }

    fn read_exss<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        if self.frame_kind == FrameKind::StandaloneExss && self.accumulator.boundary_found() {
            // Consecutive headers carry the same ext_ss_index: the frame
            // boundary of the standalone ExSS stream has been found.
            self.accumulator.retain_first();
            self.sync_bytes_consumed = 0;
            self.state = AssemblerState::CopyingFrame;
            return chunk;
        }

        for (consumed, &byte) in chunk.iter().enumerate() {
            if self.buffer.is_full() {
                warn!(
                    "{}, resynchronizing",
                    ExtractError::BufferOverflow(MAX_FRAME_SIZE)
                );
                self.reset();
                return &chunk[consumed..];
            }

            let word = self.register.push(byte);
            self.buffer.push(byte);
            self.sync_bytes_consumed += 1;
            let Some(kind) = self.register.sync_kind() else {
                continue;
            };

            if self.frame_kind == FrameKind::CorePlusExss {
                if kind.is_core() {
                    // Next Core sync word: the frame is complete.
                    self.accumulator.clear();
                    self.state = AssemblerState::CopyingFrame;
                } else {
                    self.state = AssemblerState::CheckingExssHeader;
                }
            }

            if self.frame_kind == FrameKind::StandaloneExss {
                if kind.is_exss() {
                    self.state = AssemblerState::CheckingExssHeader;
                } else {
                    error!(
                        "{}, restarting sync search",
                        ExtractError::UnexpectedSyncTransition(word)
                    );
                    // The captured sync word opens the next search.
                    self.buffer.clear();
                    self.buffer.extend(&self.register.to_be_bytes());
                    self.first_sync = word;
                    self.state = AssemblerState::FindingSubsequentSync;
                }
            }

            debug!(
                "Found sync word {word:#010X} after reading {} bytes",
                self.sync_bytes_consumed
            );
            self.sync_bytes_consumed = 0;

            return &chunk[consumed + 1..];
        }

        &[]
    }

    fn copy_frame(&mut self) {
        // The buffer holds the frame plus the next sync word, and for a
        // standalone ExSS stream also the six header bytes behind it.
        let frame_size = if self.frame_kind == FrameKind::StandaloneExss {
            self.buffer.position() - (SYNC_WORD_SIZE + EXSS_HEADER_SIZE)
        } else {
            self.buffer.position() - SYNC_WORD_SIZE
        };

        if !self.parsed {
            match parse::parse_frame(&self.buffer.bytes()[..frame_size]) {
                Ok(info) => {
                    debug!(
                        "Parsed frame header: {} Hz, {} channels, {} samples, {} us",
                        info.sample_rate, info.channel_count, info.sample_count,
                        info.frame_duration_us
                    );
                    if !self.format_announced {
                        self.output.announce_format(StreamFormat::new(
                            info.sample_rate,
                            info.channel_count,
                            info.sample_count,
                            &self.language,
                        ));
                        self.format_announced = true;
                    }
                    self.frame_info = Some(info);
                    self.parsed = true;
                }
                Err(err) => {
                    warn!("Dropping frame of {frame_size} bytes: {err:#}");
                    self.sync_bytes_consumed = 0;
                    self.exss_header_bytes = 0;
                    self.accumulator.clear();
                    if self.register.sync_kind().is_some_and(SyncKind::is_exss) {
                        self.frame_kind = FrameKind::StandaloneExss;
                    }
                    self.reseed_buffer();
                    return;
                }
            }
        }

        self.output.sample_data(&self.buffer.bytes()[..frame_size]);
        self.output
            .sample_metadata(self.pts_us, SAMPLE_FLAG_SYNC, frame_size, 0);
        self.pts_us += self
            .frame_info
            .as_ref()
            .map_or(0, |info| info.frame_duration_us);

        self.reseed_buffer();
    }
}

#[cfg(test)]
use bitstream_io::{BigEndian, BitWrite, BitWriter};
#[cfg(test)]
use crate::utils::bitstream_io::BsIoSliceReader;

#[cfg(test)]
#[derive(Debug, Default, PartialEq)]
struct CollectingOutput {
    formats: Vec<StreamFormat>,
    frames: Vec<Vec<u8>>,
    metadata: Vec<(i64, u32, usize, usize)>,
    pending: Vec<u8>,
}

#[cfg(test)]
impl SampleOutput for CollectingOutput {
    fn announce_format(&mut self, format: StreamFormat) {
        self.formats.push(format);
    }

    fn sample_data(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    fn sample_metadata(&mut self, pts_us: i64, flags: u32, size: usize, offset: usize) {
        self.metadata.push((pts_us, flags, size, offset));
        self.frames.push(std::mem::take(&mut self.pending));
    }
}

/// Core frame with NBLKS=5 (192 samples), no LFE, and a payload free of
/// sync patterns.
#[cfg(test)]
fn core_frame(sfreq: u8, amode: u8, payload_len: usize) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(32, SYNC_CORE_16BIT_BE).unwrap();
    w.write_unsigned_var(1, 1u8).unwrap(); // FTYPE
    w.write_unsigned_var(5, 31u8).unwrap(); // SHORT
    w.write_unsigned_var(1, 0u8).unwrap(); // CRC
    w.write_unsigned_var(7, 5u8).unwrap(); // NBLKS
    w.write_unsigned_var(14, 2042u16).unwrap(); // FSIZE
    w.write_unsigned_var(6, amode).unwrap();
    w.write_unsigned_var(4, sfreq).unwrap();
    w.write_unsigned_var(15, 0u16).unwrap(); // RATE through ASPF
    w.write_unsigned_var(2, 0u8).unwrap(); // LFF
    w.byte_align().unwrap();

    let mut frame = w.into_writer();
    frame.resize(frame.len() + payload_len, 0xAA);
    frame
}

/// Extension substream frame at 48 kHz with five coded channels and a
/// frame duration code of 2048 samples.
#[cfg(test)]
fn exss_frame(ext_ss_index: u8, payload_len: usize) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(32, SYNC_EXSS_16BIT_BE).unwrap();
    w.write_unsigned_var(8, 0u8).unwrap(); // UserDefinedBits
    w.write_unsigned_var(2, ext_ss_index).unwrap();
    w.write_unsigned_var(1, 0u8).unwrap(); // bHeaderSizeType
    w.write_unsigned_var(8, 17u8).unwrap(); // header size - 1
    w.write_unsigned_var(16, (18 + payload_len - 1) as u16).unwrap(); // frame size - 1
    w.write_unsigned_var(1, 1u8).unwrap(); // bStaticFieldsPresent
    w.write_unsigned_var(2, 2u8).unwrap(); // nuRefClockCode: 48000
    w.write_unsigned_var(3, 3u8).unwrap(); // frame duration code: 512 * 4
    w.write_unsigned_var(1, 0u8).unwrap(); // no timestamp
    w.write_unsigned_var(3, 0u8).unwrap(); // one audio presentation
    w.write_unsigned_var(3, 0u8).unwrap(); // one asset
    w.write_unsigned_var(u32::from(ext_ss_index) + 1, 1u8).unwrap(); // active substream mask
    w.write_unsigned_var(8, 1u8).unwrap(); // active asset mask
    w.write_unsigned_var(1, 0u8).unwrap(); // no mix metadata
    w.write_unsigned_var(16, 0u16).unwrap(); // asset frame-size table
    w.write_unsigned_var(9, 0u16).unwrap(); // asset descriptor size - 1
    w.write_unsigned_var(3, 0u8).unwrap(); // asset index
    w.write_unsigned_var(1, 0u8).unwrap(); // no type descriptor
    w.write_unsigned_var(1, 0u8).unwrap(); // no language descriptor
    w.write_unsigned_var(1, 0u8).unwrap(); // no info text
    w.write_unsigned_var(5, 0u8).unwrap(); // nuBitResolution
    w.write_unsigned_var(4, 12u8).unwrap(); // sample rate index: 48000
    w.write_unsigned_var(8, 4u8).unwrap(); // channels - 1
    w.byte_align().unwrap();

    let mut frame = w.into_writer();
    frame.resize(frame.len() + payload_len, 0xAA);
    frame
}

/// Re-packs a 16-bit big-endian stream into 14-bit words, sign-extending
/// each word the way 14-bit DTS streams store them.
#[cfg(test)]
fn to_14bit_be(dense: &[u8]) -> Vec<u8> {
    let mut reader = BsIoSliceReader::from_slice(dense);
    let mut out = Vec::with_capacity(dense.len() * 16 / 14 + 2);
    let mut bits = dense.len() as u64 * 8;

    while bits >= 14 {
        let group: u16 = reader.get_n(14).unwrap();
        let word = if group & 0x2000 != 0 {
            group | 0xC000
        } else {
            group
        };
        out.extend_from_slice(&word.to_be_bytes());
        bits -= 14;
    }

    out
}

#[cfg(test)]
fn swap_pairs(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}

#[cfg(test)]
fn run_chunked(input: &[u8], chunk_size: usize) -> CollectingOutput {
    let mut assembler = FrameAssembler::new(CollectingOutput::default(), "");
    assembler.packet_started(0, 0);
    for chunk in input.chunks(chunk_size) {
        assembler.consume(chunk);
    }
    assembler.into_output()
}

#[test]
fn standalone_core_two_frames() {
    let frame = core_frame(13, 1, 100);
    let input = frame.repeat(3);

    let mut assembler = FrameAssembler::new(CollectingOutput::default(), "eng");
    assembler.packet_started(0, 0);
    assembler.consume(&input);

    let out = assembler.output();
    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 48000);
    assert_eq!(out.formats[0].channel_count, 2);
    assert_eq!(out.formats[0].sample_count, 192);
    assert_eq!(out.formats[0].language, "eng");

    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], frame);
    assert_eq!(out.frames[1], frame);
    assert_eq!(out.metadata[0], (0, SAMPLE_FLAG_SYNC, frame.len(), 0));
    assert_eq!(out.metadata[1], (4000, SAMPLE_FLAG_SYNC, frame.len(), 0));
}

#[test]
fn standalone_exss_frames() {
    let frame = exss_frame(0, 100);
    let mut input = frame.repeat(2);
    // sync and header of the third frame delimit the second, plus a byte
    // to drive the final emission
    input.extend_from_slice(&frame[..10]);
    input.push(0);

    let out = run_chunked(&input, input.len());

    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 48000);
    // five coded channels round up to the 5.1 layout
    assert_eq!(out.formats[0].channel_count, 6);
    assert_eq!(out.formats[0].sample_count, 2048);

    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], frame);
    assert_eq!(out.frames[1], frame);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 42666);
}

#[test]
fn core_plus_exss_frames() {
    let mut unit = core_frame(8, 0, 60);
    unit.extend_from_slice(&exss_frame(0, 50));

    let mut input = unit.repeat(2);
    input.extend_from_slice(&unit[..SYNC_WORD_SIZE]);
    input.push(0);

    let out = run_chunked(&input, input.len());

    // format comes from the Core header: 44.1 kHz mono
    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 44100);
    assert_eq!(out.formats[0].channel_count, 1);
    assert_eq!(out.formats[0].sample_count, 192);

    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], unit);
    assert_eq!(out.frames[1], unit);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 192_000_000 / 44100);
}

#[test]
fn core_14bit_big_endian_stream() {
    // 49 dense bytes per frame keep frame boundaries aligned to whole
    // 14-bit words
    let frame = core_frame(13, 1, 38);
    assert_eq!(frame.len() % 7, 0);
    let input = to_14bit_be(&frame.repeat(3));
    let wire_frame_len = frame.len() * 16 / 14;

    let out = run_chunked(&input, input.len());

    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 48000);
    assert_eq!(out.formats[0].channel_count, 2);

    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], input[..wire_frame_len]);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 4000);
}

#[test]
fn core_16bit_little_endian_stream() {
    let frame = core_frame(13, 1, 39);
    assert_eq!(frame.len() % 2, 0);
    let input = swap_pairs(&frame.repeat(3));

    let out = run_chunked(&input, input.len());

    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 48000);
    assert_eq!(out.formats[0].channel_count, 2);

    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], input[..frame.len()]);
    assert_eq!(out.metadata[1].0, 4000);
}

#[test]
fn ignores_streams_without_sync() {
    let input: Vec<u8> = (0..10_000u32).map(|i| (i * 37 + 123) as u8).collect();

    let out = run_chunked(&input, 512);

    assert!(out.formats.is_empty());
    assert!(out.frames.is_empty());
}

#[test]
fn sync_split_across_chunks() {
    let frame = core_frame(13, 1, 40);
    let input = frame.repeat(3);

    for split in 1..SYNC_WORD_SIZE {
        let mut assembler = FrameAssembler::new(CollectingOutput::default(), "");
        assembler.packet_started(0, 0);
        assembler.consume(&input[..split]);
        assembler.consume(&input[split..]);

        let out = assembler.output();
        assert_eq!(out.frames.len(), 2, "split at {split}");
        assert_eq!(out.frames[0], frame);
    }
}

#[test]
fn chunking_is_idempotent() {
    let mut input = core_frame(13, 1, 100).repeat(2);
    input.extend_from_slice(&core_frame(13, 1, 75));
    input.extend_from_slice(&core_frame(13, 1, 100));

    let reference = run_chunked(&input, input.len());
    assert_eq!(reference.frames.len(), 3);

    for chunk_size in [1, 7, 13, 4096] {
        let out = run_chunked(&input, chunk_size);
        assert_eq!(out.formats, reference.formats, "chunk size {chunk_size}");
        assert_eq!(out.frames, reference.frames, "chunk size {chunk_size}");
        assert_eq!(out.metadata, reference.metadata, "chunk size {chunk_size}");
    }
}

#[test]
fn recovers_from_oversized_frame() {
    let frame = core_frame(13, 1, 100);
    let mut input = frame[..11].to_vec();
    input.extend(std::iter::repeat(0x55).take(40_000));
    input.extend_from_slice(&frame.repeat(3));

    let out = run_chunked(&input, 4096);

    // the damaged frame is dropped, the format is still announced once
    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], frame);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 4000);
}

#[test]
fn drops_undecodable_first_frame() {
    let frame = core_frame(13, 1, 100);
    // a lone sync word and one stray byte form a frame too short to parse
    let mut input = frame[..SYNC_WORD_SIZE].to_vec();
    input.push(0xAA);
    input.extend_from_slice(&frame.repeat(3));

    let out = run_chunked(&input, input.len());

    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], frame);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 4000);
}

#[test]
fn recovers_from_core_sync_in_standalone_exss() {
    let exss = exss_frame(0, 20);
    let core = core_frame(13, 1, 100);

    // a standalone ExSS frame cut short by a Core stream
    let mut input = exss[..30].to_vec();
    input.extend_from_slice(&core.repeat(3));

    let out = run_chunked(&input, input.len());

    // the torn ExSS frame is dropped and the Core sync word opens the
    // next frame search
    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 48000);
    assert_eq!(out.formats[0].channel_count, 2);
    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], core);
    assert_eq!(out.frames[1], core);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 4000);
}

#[test]
fn recovers_from_exss_accumulator_overflow() {
    // five ExSS headers whose ext_ss_index never repeats the first one:
    // no frame boundary is ever found and the accumulator runs over
    let mut input = Vec::new();
    for ext_ss_index in [0u8, 1, 2, 3, 0] {
        input.extend_from_slice(&exss_frame(ext_ss_index, 20));
    }
    let core = core_frame(13, 1, 100);
    input.extend_from_slice(&core.repeat(3));

    let out = run_chunked(&input, input.len());

    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.formats[0].sample_rate, 48000);
    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[0], core);
    assert_eq!(out.frames[1], core);
    assert_eq!(out.metadata[0].0, 0);
    assert_eq!(out.metadata[1].0, 4000);
}

#[test]
fn seek_resets_frame_state_but_not_format() {
    let frame = core_frame(13, 1, 100);

    let mut assembler = FrameAssembler::new(CollectingOutput::default(), "");
    assembler.packet_started(0, 0);
    assembler.consume(&frame.repeat(2));
    assert_eq!(assembler.output().frames.len(), 1);

    assembler.seek();
    assembler.packet_started(1_000_000, 0);
    assembler.consume(&frame.repeat(3));

    let out = assembler.output();
    assert_eq!(out.formats.len(), 1);
    assert_eq!(out.frames.len(), 3);
    assert_eq!(out.metadata[1].0, 1_000_000);
    assert_eq!(out.metadata[2].0, 1_004_000);
}

#[test]
fn buffer_position_stays_bounded() {
    let mut input = core_frame(13, 1, 100)[..11].to_vec();
    input.extend(std::iter::repeat(0x55).take(80_000));

    let mut assembler = FrameAssembler::new(CollectingOutput::default(), "");
    for chunk in input.chunks(997) {
        assembler.consume(chunk);
        assert!(assembler.buffer.position() <= MAX_FRAME_SIZE);
    }
    assert!(assembler.output().frames.is_empty());
}
