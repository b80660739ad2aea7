//! Bitstream I/O utilities for header parsing.
//!
//! Provides MSB-first bitstream reading over byte slices with a movable
//! bit position, used by the frame-header decoders.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        // Skip bounds check for small reads - bitstream_io handles EOF internally
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // Only call position() on error path to avoid overhead
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "get_n({}): out of bounds bits at {}",
                        n,
                        self.bs.position_in_bits().unwrap_or(0)
                    ),
                ))
            }
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        // Skip bounds check for small skips - bitstream_io handles EOF internally
        if n <= 64 {
            self.bs.skip(n)
        } else {
            // For larger skips, keep bounds check
            self.available().and_then(|avail| {
                if n as u64 > avail {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "skip_n: out of bounds bits",
                    ))
                } else {
                    self.bs.skip(n)
                }
            })
        }
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    #[inline(always)]
    pub fn set_position(&mut self, pos: u64) -> io::Result<u64> {
        if pos > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("set_position({pos}): out of bounds bits, len {}", self.len),
            ));
        }

        self.bs.seek_bits(SeekFrom::Start(pos))
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[test]
fn read_across_byte_boundaries() -> io::Result<()> {
    let mut reader = BsIoSliceReader::from_slice(&[0b1010_1100, 0b0101_0011, 0xFF]);

    assert!(reader.get()?);
    assert_eq!(reader.get_n::<u32>(6)?, 0b010110);
    assert_eq!(reader.get_n::<u32>(9)?, 0b0_0101_0011);
    assert_eq!(reader.available()?, 8);
    reader.skip_n(8)?;
    assert_eq!(reader.available()?, 0);
    assert!(reader.get_n::<u32>(1).is_err());

    Ok(())
}

#[test]
fn position_jumps() -> io::Result<()> {
    let mut reader = BsIoSliceReader::from_slice(&[0x12, 0x34, 0x56]);

    reader.set_position(8)?;
    assert_eq!(reader.get_n::<u8>(8)?, 0x34);
    assert_eq!(reader.position()?, 16);
    reader.set_position(4)?;
    assert_eq!(reader.get_n::<u8>(8)?, 0x23);
    assert!(reader.set_position(25).is_err());

    Ok(())
}
