//! Primitive binary encoding, delegated to `bincode`.
//!
//! Integers use bincode's standard configuration (little-endian, varint), so
//! small tokens and lengths take one byte. The graph codec layers value tags
//! and back-references on top of these primitives.

use bincode::config::{self, Configuration};
use bincode::error::DecodeError;
use bincode::{Decode, Encode};

use crate::error::CodecResult;

const WIRE: Configuration = config::standard();

/// Append-only primitive encoder.
#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    fn put<T: Encode>(&mut self, value: T) -> CodecResult<()> {
        bincode::encode_into_std_write(value, &mut self.buf, WIRE)?;
        Ok(())
    }

    /// Writes one raw byte.
    pub fn write_u8(&mut self, v: u8) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes a boolean.
    pub fn write_bool(&mut self, v: bool) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes an `i8`.
    pub fn write_i8(&mut self, v: i8) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes an `i16`.
    pub fn write_i16(&mut self, v: i16) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes a `char`.
    pub fn write_char(&mut self, v: char) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes an `i32`.
    pub fn write_i32(&mut self, v: i32) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes an `i64`.
    pub fn write_i64(&mut self, v: i64) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes an `f32`.
    pub fn write_f32(&mut self, v: f32) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes an `f64`.
    pub fn write_f64(&mut self, v: f64) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes a small non-negative integer (token, index or length).
    pub fn write_small_int(&mut self, v: u32) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, v: &str) -> CodecResult<()> {
        self.put(v)
    }

    /// Writes a length-prefixed byte range.
    pub fn write_bytes(&mut self, v: &[u8]) -> CodecResult<()> {
        self.put(v)
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Consumes the encoder, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over encoded bytes.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Starts decoding at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<T: Decode<()>>(&mut self) -> CodecResult<T> {
        let rest = self.bytes.get(self.pos..).unwrap_or_default();
        if rest.is_empty() {
            return Err(DecodeError::UnexpectedEnd { additional: 1 }.into());
        }
        let (value, read) = bincode::decode_from_slice(rest, WIRE)?;
        self.pos += read;
        Ok(value)
    }

    /// Reads one raw byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.take()
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        self.take()
    }

    /// Reads an `i8`.
    pub fn read_i8(&mut self) -> CodecResult<i8> {
        self.take()
    }

    /// Reads an `i16`.
    pub fn read_i16(&mut self) -> CodecResult<i16> {
        self.take()
    }

    /// Reads a `char`.
    pub fn read_char(&mut self) -> CodecResult<char> {
        self.take()
    }

    /// Reads an `i32`.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.take()
    }

    /// Reads an `i64`.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        self.take()
    }

    /// Reads an `f32`.
    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.take()
    }

    /// Reads an `f64`.
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.take()
    }

    /// Reads a small non-negative integer.
    pub fn read_small_int(&mut self) -> CodecResult<u32> {
        self.take()
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let bytes = self.read_prefixed()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::Other("string is not valid UTF-8").into())
    }

    /// Reads a length-prefixed byte range.
    pub fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        Ok(self.read_prefixed()?.to_vec())
    }

    /// Reads a varint length and borrows that many bytes.
    ///
    /// The length is checked against the remaining input before anything is
    /// allocated, so a corrupt prefix is an error rather than a huge buffer.
    fn read_prefixed(&mut self) -> CodecResult<&'a [u8]> {
        let len: u64 = self.take()?;
        let remaining = self.bytes.len().saturating_sub(self.pos);
        let len = match usize::try_from(len) {
            Ok(len) if len <= remaining => len,
            _ => {
                let additional = usize::try_from(len).unwrap_or(usize::MAX) - remaining;
                return Err(DecodeError::UnexpectedEnd { additional }.into());
            }
        };
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn primitives_roundtrip_in_order() {
        let mut enc = Encoder::new();
        enc.write_bool(true).unwrap();
        enc.write_i32(-42).unwrap();
        enc.write_i64(1 << 40).unwrap();
        enc.write_f64(2.5).unwrap();
        enc.write_str("compileJava").unwrap();
        enc.write_bytes(&[1, 2, 3]).unwrap();
        enc.write_char('λ').unwrap();

        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes);
        assert!(dec.read_bool().unwrap());
        assert_eq!(dec.read_i32().unwrap(), -42);
        assert_eq!(dec.read_i64().unwrap(), 1 << 40);
        assert_eq!(dec.read_f64().unwrap(), 2.5);
        assert_eq!(dec.read_string().unwrap(), "compileJava");
        assert_eq!(dec.read_bytes().unwrap(), vec![1, 2, 3]);
        assert_eq!(dec.read_char().unwrap(), 'λ');
        assert!(dec.is_at_end());
    }

    #[test]
    fn small_ints_take_one_byte() {
        let mut enc = Encoder::new();
        enc.write_small_int(7).unwrap();
        assert_eq!(enc.position(), 1);
    }

    #[test]
    fn reading_past_end_is_an_error() {
        let mut dec = Decoder::new(&[]);
        assert!(matches!(dec.read_i32(), Err(CodecError::Decode(_))));
    }

    #[test]
    fn oversized_length_prefix_is_an_error() {
        let mut bytes = vec![253];
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(
            dec.read_bytes(),
            Err(CodecError::Decode(DecodeError::UnexpectedEnd { .. }))
        ));
        let mut dec = Decoder::new(&bytes);
        assert!(dec.read_string().is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut enc = Encoder::new();
        enc.write_bytes(&[0xff, 0xfe]).unwrap();
        let bytes = enc.into_bytes();
        assert!(Decoder::new(&bytes).read_string().is_err());
    }

    #[test]
    fn truncated_string_is_an_error() {
        let mut enc = Encoder::new();
        enc.write_str("a long enough string").unwrap();
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes[..4]);
        assert!(dec.read_string().is_err());
    }
}
