#![forbid(unsafe_code)]
//! Encoding, varint, and buffer utilities shared by the row codecs.

pub mod var {
    //! Unsigned varints and ZigZag signed integers.

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            } else {
                out.push(byte | 0x80);
            }
        }
    }

    /// Encodes an i64 as a ZigZag-encoded varint.
    pub fn encode_i64(v: i64, out: &mut Vec<u8>) {
        encode_u64(zigzag(v), out);
    }

    /// Maps a signed integer onto the unsigned ZigZag space.
    #[inline]
    pub fn zigzag(v: i64) -> u64 {
        ((v << 1) ^ (v >> 63)) as u64
    }

    /// Inverse of [`zigzag`].
    #[inline]
    pub fn unzigzag(v: u64) -> i64 {
        ((v >> 1) as i64) ^ (-((v & 1) as i64))
    }
}

pub mod buf {
    //! A slice-backed cursor that reports truncation as corruption.

    use core::fmt;

    use crate::types::{MicroBlockError, Result};

    /// A cursor for reading bytes from a slice with offset tracking.
    #[derive(Clone, Copy)]
    pub struct ByteCursor<'a> {
        buf: &'a [u8],
        off: usize,
    }

    impl<'a> ByteCursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Creates a cursor positioned at `off`.
        pub fn at(buf: &'a [u8], off: usize) -> Self {
            Self { buf, off }
        }

        /// Current read offset.
        pub fn offset(&self) -> usize {
            self.off
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }

        /// Takes the next `n` bytes without copying.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            let end = self
                .off
                .checked_add(n)
                .ok_or(MicroBlockError::Corruption("cursor offset overflow"))?;
            if end > self.buf.len() {
                return Err(MicroBlockError::Corruption("row buffer truncated"));
            }
            let slice = &self.buf[self.off..end];
            self.off = end;
            Ok(slice)
        }

        /// Reads one byte.
        pub fn read_u8(&mut self) -> Result<u8> {
            Ok(self.take(1)?[0])
        }

        /// Reads a big-endian u16.
        pub fn read_u16_be(&mut self) -> Result<u16> {
            let bytes = self.take(2)?;
            Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
        }

        /// Reads a big-endian u64.
        pub fn read_u64_be(&mut self) -> Result<u64> {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(self.take(8)?);
            Ok(u64::from_be_bytes(arr))
        }

        /// Reads an unsigned varint.
        pub fn read_var_u64(&mut self) -> Result<u64> {
            let mut result = 0u64;
            let mut shift = 0u32;
            for i in 0..10 {
                let byte = self.read_u8()?;
                let payload = (byte & 0x7f) as u64;
                if i == 9 && payload > 1 {
                    return Err(MicroBlockError::Corruption("varint overflows 64 bits"));
                }
                result |= payload << shift;
                if (byte & 0x80) == 0 {
                    return Ok(result);
                }
                shift += 7;
            }
            Err(MicroBlockError::Corruption("varint longer than 10 bytes"))
        }

        /// Reads a ZigZag-encoded signed varint.
        pub fn read_var_i64(&mut self) -> Result<i64> {
            Ok(super::var::unzigzag(self.read_var_u64()?))
        }

        /// Reads a varint length prefix followed by that many bytes.
        pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
            let len = self.read_var_u64()?;
            let len = usize::try_from(len)
                .map_err(|_| MicroBlockError::Corruption("length prefix exceeds usize"))?;
            self.take(len)
        }
    }

    impl<'a> fmt::Debug for ByteCursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ByteCursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}
