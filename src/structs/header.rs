//! Core and Extension Substream frame headers.
//!
//! Raw header fields read from a normalized (16-bit big-endian) frame,
//! plus the fixed lookup tables shared by both header forms.

use anyhow::{Result, bail};

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::ParseError;

/// Channel count by Core `AMODE` index, before LFE adjustment.
pub const CHANNEL_COUNT_TABLE: [u32; 10] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5];

/// Sample rate in Hz by Core `SFREQ` index. Zero marks reserved entries.
pub const SAMPLE_RATE_TABLE: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

/// Sample rate in Hz by extension substream asset sample-rate index.
pub const SAMPLE_RATE_TABLE_EXSS: [u32; 16] = [
    8000, 16000, 32000, 64000, 128000, 22050, 44100, 88200, 176400, 352800, 12000, 24000, 48000,
    96000, 192000, 384000,
];

/// Reference clock rate in Hz by extension substream clock code.
pub const REF_CLOCK_TABLE: [u32; 4] = [32000, 44100, 48000, 0x7FFF_FFFF];

/// Bits needed to parse a Core header past the sync word.
const CORE_HEADER_BITS: u64 = 55;

/// Core substream header fields.
///
/// Field names follow the bitstream syntax element names.
#[derive(Debug, Clone, Default)]
pub struct CoreHeader {
    pub nblks: u32,
    pub fsize: u32,
    pub amode: u32,
    pub sfreq: u32,
    pub lff: u32,
}

impl CoreHeader {
    /// Reads the Core header fields. The reader must be positioned just
    /// past the 32-bit sync word.
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let available = reader.available()?;
        if available < CORE_HEADER_BITS {
            bail!(ParseError::NotEnoughBits {
                section: "core header",
                needed: CORE_HEADER_BITS,
                available,
            });
        }

        reader.skip_n(7)?; // FTYPE(1) + SHORT(5) + CRC(1)
        let nblks = reader.get_n(7)?;
        let fsize = reader.get_n::<u32>(14)? + 1;
        let amode = reader.get_n(6)?;
        let sfreq = reader.get_n(4)?;
        // RATE(5) + FIXEDBIT + DYNF + TIMEF + AUXF + HDCD + EXT_AUDIO_ID(3) + EXT_AUDIO + ASPF
        reader.skip_n(15)?;
        let lff = reader.get_n(2)?;

        Ok(Self {
            nblks,
            fsize,
            amode,
            sfreq,
            lff,
        })
    }

    /// Samples per channel carried by this frame.
    pub fn sample_count(&self) -> u32 {
        (self.nblks + 1) * 32
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_TABLE[self.sfreq as usize]
    }

    /// Channel count from the `AMODE` table plus one for a present LFE.
    /// Out-of-table modes map to zero and rely on the downstream defaults.
    pub fn channel_count(&self) -> u32 {
        let base = if self.amode <= 9 {
            CHANNEL_COUNT_TABLE[self.amode as usize]
        } else {
            0
        };

        base + u32::from(self.lff != 0)
    }
}

/// Extension substream header fields.
///
/// Asset descriptors beyond the stream-format fields are skipped; when
/// several assets are present the last descriptor wins, matching single
/// active-asset streams where only one descriptor exists.
#[derive(Debug, Clone, Default)]
pub struct ExssHeader {
    pub ext_ss_index: u32,
    pub header_size: u32,
    pub frame_size: u32,
    pub static_fields_present: bool,
    pub ref_clock_code: u32,
    /// Effective frame duration code: `512 * (coded + 1)`, zero when the
    /// static fields are absent.
    pub frame_duration_code: u32,
    pub num_audio_presentations: u32,
    pub num_assets: u32,
    pub sample_rate: u32,
    pub channel_count: u32,
}

impl ExssHeader {
    /// Reads the extension substream header. The reader must be positioned
    /// just past the 32-bit sync word.
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let available = reader.available()?;
        if available < 11 {
            bail!(ParseError::NotEnoughBits {
                section: "extension substream header",
                needed: 11,
                available,
            });
        }

        reader.skip_n(8)?; // UserDefinedBits
        let ext_ss_index = reader.get_n::<u32>(2)?;

        let (header_size_bits, frame_size_bits) = if reader.get()? { (12, 20) } else { (8, 16) };

        let available = reader.available()?;
        if available < u64::from(header_size_bits + frame_size_bits) {
            bail!(ParseError::NotEnoughBits {
                section: "extension substream header",
                needed: u64::from(header_size_bits + frame_size_bits),
                available,
            });
        }

        let header_size = reader.get_n::<u32>(header_size_bits)? + 1;
        let frame_size = reader.get_n::<u32>(frame_size_bits)? + 1;

        // The whole declared header must be present before walking it.
        let header_bits = (u64::from(header_size) * 8)
            .saturating_sub(u64::from(32 + 11 + header_size_bits + frame_size_bits));
        let available = reader.available()?;
        if available < header_bits {
            bail!(ParseError::NotEnoughBits {
                section: "extension substream header",
                needed: header_bits,
                available,
            });
        }

        let mut header = Self {
            ext_ss_index,
            header_size,
            frame_size,
            ..Default::default()
        };

        header.static_fields_present = reader.get()?;
        if header.static_fields_present {
            header.ref_clock_code = reader.get_n(2)?;
            header.frame_duration_code = 512 * (reader.get_n::<u32>(3)? + 1);

            if reader.get()? {
                reader.skip_n(36)?; // bTimeStampFlag: skip the embedded timestamp
            }

            header.num_audio_presentations = reader.get_n::<u32>(3)? + 1;
            header.num_assets = reader.get_n::<u32>(3)? + 1;

            let mut active_substream_masks = [0u32; 8];
            for mask in active_substream_masks
                .iter_mut()
                .take(header.num_audio_presentations as usize)
            {
                *mask = reader.get_n(ext_ss_index + 1)?;
            }

            for mask in active_substream_masks
                .iter()
                .take(header.num_audio_presentations as usize)
            {
                for substream in 0..=ext_ss_index {
                    if (mask >> substream) & 1 == 1 {
                        reader.skip_n(8)?; // nuActiveAssetMask
                    }
                }
            }

            if reader.get()? {
                // bMixMetadataEnbl
                reader.skip_n(2)?; // nuMixMetadataAdjLevel
                let mix_out_mask_bits = (reader.get_n::<u32>(2)? + 1) << 2;
                let mix_out_configs = reader.get_n::<u32>(2)? + 1;
                for _ in 0..mix_out_configs {
                    reader.skip_n(mix_out_mask_bits)?; // nuMixOutChMask
                }
            }
        } else {
            header.num_audio_presentations = 1;
            header.num_assets = 1;
        }

        // Asset frame-size table
        for _ in 0..header.num_assets {
            reader.skip_n(frame_size_bits)?;
        }

        for _ in 0..header.num_assets {
            let _descriptor_size = reader.get_n::<u32>(9)? + 1;
            let _asset_index = reader.get_n::<u32>(3)?;

            if header.static_fields_present {
                if reader.get()? {
                    reader.skip_n(4)?; // nuAssetTypeDescriptor
                }
                if reader.get()? {
                    reader.skip_n(24)?; // LanguageDescriptor
                }
                if reader.get()? {
                    let info_text_bytes = reader.get_n::<u32>(10)? + 1;
                    reader.skip_n(info_text_bytes * 8)?; // InfoTextString
                }
                reader.skip_n(5)?; // nuBitResolution
                header.sample_rate = SAMPLE_RATE_TABLE_EXSS[reader.get_n::<u32>(4)? as usize];
                header.channel_count = reader.get_n::<u32>(8)? + 1;
            } else {
                header.sample_rate = 48000;
                header.channel_count = 8;
            }
        }

        Ok(header)
    }

    /// Samples per channel carried by this frame, derived from the frame
    /// duration code and the asset sample rate measured in reference
    /// clock periods.
    pub fn sample_count(&self) -> u32 {
        self.frame_duration_code * (self.sample_rate / REF_CLOCK_TABLE[self.ref_clock_code as usize])
    }
}

#[cfg(test)]
fn reader_past_sync(frame: &[u8]) -> BsIoSliceReader<'_> {
    let mut reader = BsIoSliceReader::from_slice(frame);
    reader.skip_n(32).unwrap();
    reader
}

#[test]
fn reads_core_header_fields() {
    // 48 kHz stereo, 6 sample blocks
    let frame = [
        0x7F, 0xFE, 0x80, 0x01, 0xFC, 0x14, 0x7F, 0xA0, 0x74, 0x00, 0x00,
    ];
    let header = CoreHeader::read(&mut reader_past_sync(&frame)).unwrap();

    assert_eq!(header.nblks, 5);
    assert_eq!(header.fsize, 2043);
    assert_eq!(header.amode, 1);
    assert_eq!(header.sfreq, 13);
    assert_eq!(header.lff, 0);

    assert_eq!(header.sample_count(), 192);
    assert_eq!(header.sample_rate(), 48000);
    assert_eq!(header.channel_count(), 2);
}

#[test]
fn core_header_needs_55_bits() {
    let frame = [0x7F, 0xFE, 0x80, 0x01, 0xFC, 0x14, 0x7F];
    assert!(CoreHeader::read(&mut reader_past_sync(&frame)).is_err());
}

#[test]
fn channel_count_handles_reserved_amode() {
    let header = CoreHeader {
        amode: 10,
        lff: 2,
        ..Default::default()
    };
    assert_eq!(header.channel_count(), 1);

    let header = CoreHeader {
        amode: 63,
        lff: 0,
        ..Default::default()
    };
    assert_eq!(header.channel_count(), 0);
}

#[test]
fn reads_exss_header_without_static_fields() {
    // header_size_type=0, static fields absent: one implicit asset with
    // the 48 kHz / 8 channel fallback
    let frame = [
        0x64, 0x58, 0x20, 0x25, 0x00, 0x00, 0x00, 0x00, 0x60, 0x00, 0x00, 0x00,
    ];
    let header = ExssHeader::read(&mut reader_past_sync(&frame)).unwrap();

    assert!(!header.static_fields_present);
    assert_eq!(header.ext_ss_index, 0);
    assert_eq!(header.frame_size, 4);
    assert_eq!(header.num_audio_presentations, 1);
    assert_eq!(header.num_assets, 1);
    assert_eq!(header.sample_rate, 48000);
    assert_eq!(header.channel_count, 8);
    assert_eq!(header.sample_count(), 0);
}

#[test]
fn reads_exss_header_with_static_fields() -> anyhow::Result<()> {
    use bitstream_io::{BigEndian, BitWrite, BitWriter};

    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(32, super::sync::SYNC_EXSS_16BIT_BE)?;
    w.write_unsigned_var(8, 0u8)?; // UserDefinedBits
    w.write_unsigned_var(2, 1u8)?; // nExtSSIndex: two substreams
    w.write_unsigned_var(1, 1u8)?; // bHeaderSizeType: 12/20-bit size fields
    w.write_unsigned_var(12, 0u16)?; // header size - 1
    w.write_unsigned_var(20, 999u32)?; // frame size - 1
    w.write_unsigned_var(1, 1u8)?; // bStaticFieldsPresent
    w.write_unsigned_var(2, 1u8)?; // nuRefClockCode: 44100
    w.write_unsigned_var(3, 2u8)?; // frame duration code: 512 * 3
    w.write_unsigned_var(1, 1u8)?; // bTimeStampFlag
    w.write_unsigned_var(36, 0u64)?; // timestamp
    w.write_unsigned_var(3, 1u8)?; // two audio presentations
    w.write_unsigned_var(3, 1u8)?; // two assets
    w.write_unsigned_var(2, 0b10u8)?; // active substream mask, presentation 0
    w.write_unsigned_var(2, 0b11u8)?; // active substream mask, presentation 1
    w.write_unsigned_var(8, 0u8)?; // asset mask: presentation 0, substream 1
    w.write_unsigned_var(8, 0u8)?; // asset mask: presentation 1, substream 0
    w.write_unsigned_var(8, 0u8)?; // asset mask: presentation 1, substream 1
    w.write_unsigned_var(1, 1u8)?; // bMixMetadataEnbl
    w.write_unsigned_var(2, 0u8)?; // nuMixMetadataAdjLevel
    w.write_unsigned_var(2, 1u8)?; // 8 bits per mix-out mask
    w.write_unsigned_var(2, 1u8)?; // two mix-out configs
    w.write_unsigned_var(16, 0u16)?; // mix-out masks
    w.write_unsigned_var(20, 0u32)?; // asset frame-size table, asset 0
    w.write_unsigned_var(20, 0u32)?; // asset frame-size table, asset 1
    // asset 0 descriptor
    w.write_unsigned_var(9, 0u16)?;
    w.write_unsigned_var(3, 0u8)?;
    w.write_unsigned_var(1, 1u8)?; // bAssetTypeDescrPresent
    w.write_unsigned_var(4, 0u8)?;
    w.write_unsigned_var(1, 1u8)?; // bLanguageDescrPresent
    w.write_unsigned_var(24, 0u32)?;
    w.write_unsigned_var(1, 1u8)?; // bInfoTextPresent
    w.write_unsigned_var(10, 1u16)?; // two text bytes
    w.write_unsigned_var(16, 0u16)?;
    w.write_unsigned_var(5, 0u8)?; // nuBitResolution
    w.write_unsigned_var(4, 6u8)?; // sample rate index: 44100
    w.write_unsigned_var(8, 3u8)?; // channels - 1
    // asset 1 descriptor
    w.write_unsigned_var(9, 0u16)?;
    w.write_unsigned_var(3, 1u8)?;
    w.write_unsigned_var(1, 0u8)?;
    w.write_unsigned_var(1, 0u8)?;
    w.write_unsigned_var(1, 0u8)?;
    w.write_unsigned_var(5, 0u8)?;
    w.write_unsigned_var(4, 13u8)?; // sample rate index: 96000
    w.write_unsigned_var(8, 7u8)?; // channels - 1
    w.byte_align()?;
    let frame = w.into_writer();

    let header = ExssHeader::read(&mut reader_past_sync(&frame))?;

    assert!(header.static_fields_present);
    assert_eq!(header.ext_ss_index, 1);
    assert_eq!(header.frame_size, 1000);
    assert_eq!(header.ref_clock_code, 1);
    assert_eq!(header.frame_duration_code, 1536);
    assert_eq!(header.num_audio_presentations, 2);
    assert_eq!(header.num_assets, 2);
    // the last asset descriptor wins
    assert_eq!(header.sample_rate, 96000);
    assert_eq!(header.channel_count, 8);
    assert_eq!(header.sample_count(), 1536 * 2);

    Ok(())
}

#[test]
fn exss_header_rejects_truncated_declared_size() {
    // declares a 4096-byte header but only a few bytes follow
    let frame = [
        0x64, 0x58, 0x20, 0x25, 0x00, 0x3F, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let err = ExssHeader::read(&mut reader_past_sync(&frame)).unwrap_err();
    assert!(err.to_string().contains("Not enough bits"));
}
