#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Streaming parser for DTS elementary audio bitstreams.
//!
//! ### Bitstream Organization
//!
//! **Carrier forms**: Core substream in 16-bit or 14-bit-packed storage,
//! big- or little-endian, and the Extension Substream (ExSS), standalone
//! or following a Core frame.
//! **Frame boundaries**: marked by 32-bit sync words; standalone ExSS
//! streams are additionally delimited by a repeating `ext_ss_index`.
//!
//! ### Derived Format
//!
//! The first complete frame header yields sample rate, channel count,
//! samples per frame and the frame duration used to advance presentation
//! timestamps.
//!
//! ## Quick Start
//!
//! Feed arbitrarily sized chunks into a
//! [`FrameAssembler`](process::extract::FrameAssembler) bound to a
//! [`SampleOutput`](process::SampleOutput) sink:
//!
//! ```rust,no_run
//! use dtshd::process::{SampleOutput, extract::FrameAssembler};
//! use dtshd::structs::format::StreamFormat;
//!
//! struct Printer;
//!
//! impl SampleOutput for Printer {
//!     fn announce_format(&mut self, format: StreamFormat) {
//!         println!("{} Hz, {} channels", format.sample_rate, format.channel_count);
//!     }
//!     fn sample_data(&mut self, data: &[u8]) {
//!         println!("payload chunk: {} bytes", data.len());
//!     }
//!     fn sample_metadata(&mut self, pts_us: i64, _flags: u32, size: usize, _offset: usize) {
//!         println!("frame: {size} bytes at {pts_us} us");
//!     }
//! }
//!
//! let mut assembler = FrameAssembler::new(Printer, "eng");
//! assembler.packet_started(0, 0);
//!
//! for chunk in std::fs::read("stream.dts")?.chunks(4096) {
//!     assembler.consume(chunk);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Processing functionality for DTS elementary streams.
///
/// 1. **Frame Assembly** ([`process::extract`]): Reassembles complete
///    frames from chunked input using sync-word detection.
///
/// 2. **Header Parsing** ([`process::parse`]): Derives the stream format
///    and frame timing from Core and ExSS headers.
pub mod process;

/// Data structures representing DTS format components.
///
/// - **Sync Patterns** ([`structs::sync`]): Sync-word constants and detection
/// - **Headers** ([`structs::header`]): Core and ExSS header fields
/// - **Format** ([`structs::format`]): Derived stream format
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
