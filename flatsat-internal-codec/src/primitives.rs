//! Encoding of scalars, strings, blobs and sequences.
use std::convert::TryFrom;
use std::io::{self, BufRead, Read, Write};

use crate::vli_enc;
use crate::{CodecError, MAX_SEQUENCE_LEN};

/// Writes an unsigned integer using the variable length encoding.
pub fn write_u64(target: &mut impl Write, value: u64) -> io::Result<()> {
    vli_enc::write_u64(target, value)
}

/// Reads an unsigned integer written by [`write_u64`].
pub fn read_u64(source: &mut impl BufRead) -> Result<u64, CodecError> {
    Ok(vli_enc::read_u64(source)?)
}

/// Writes an unsigned integer that is used as index or count.
pub fn write_usize(target: &mut impl Write, value: usize) -> io::Result<()> {
    write_u64(target, value as u64)
}

/// Reads an unsigned integer that is used as index or count.
pub fn read_usize(source: &mut impl BufRead) -> Result<usize, CodecError> {
    let value = read_u64(source)?;
    usize::try_from(value).map_err(|_| CodecError::IntegerOverflow { target: "usize" })
}

/// Writes a signed integer using LEB128.
pub fn write_i64(target: &mut impl Write, value: i64) -> io::Result<()> {
    leb128::write::signed(target, value).map(|_| ())
}

/// Reads a signed integer written by [`write_i64`].
pub fn read_i64(source: &mut impl BufRead) -> Result<i64, CodecError> {
    leb128::read::signed(source).map_err(|err| match err {
        leb128::read::Error::IoError(cause) => CodecError::from(cause),
        leb128::read::Error::Overflow => CodecError::IntegerOverflow { target: "i64" },
    })
}

/// Writes a 32-bit signed integer.
pub fn write_i32(target: &mut impl Write, value: i32) -> io::Result<()> {
    write_i64(target, value as i64)
}

/// Reads a 32-bit signed integer, rejecting values outside of its range.
pub fn read_i32(source: &mut impl BufRead) -> Result<i32, CodecError> {
    let value = read_i64(source)?;
    i32::try_from(value).map_err(|_| CodecError::IntegerOverflow { target: "i32" })
}

/// Writes a 32-bit unsigned integer.
pub fn write_u32(target: &mut impl Write, value: u32) -> io::Result<()> {
    write_u64(target, value as u64)
}

/// Reads a 32-bit unsigned integer, rejecting values outside of its range.
pub fn read_u32(source: &mut impl BufRead) -> Result<u32, CodecError> {
    let value = read_u64(source)?;
    u32::try_from(value).map_err(|_| CodecError::IntegerOverflow { target: "u32" })
}

/// Writes the bit pattern of a double, so NaN payloads and signed zeros survive.
pub fn write_f64(target: &mut impl Write, value: f64) -> io::Result<()> {
    target.write_all(&value.to_bits().to_le_bytes())
}

/// Reads a double written by [`write_f64`].
pub fn read_f64(source: &mut impl BufRead) -> Result<f64, CodecError> {
    let mut bytes = [0; 8];
    source.read_exact(&mut bytes)?;
    Ok(f64::from_bits(u64::from_le_bytes(bytes)))
}

pub fn write_bool(target: &mut impl Write, value: bool) -> io::Result<()> {
    target.write_all(&[value as u8])
}

pub fn read_bool(source: &mut impl BufRead) -> Result<bool, CodecError> {
    let mut byte = [0; 1];
    source.read_exact(&mut byte)?;
    match byte[0] {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(CodecError::InvalidBool { value }),
    }
}

/// Reads a length prefix and checks it against [`MAX_SEQUENCE_LEN`].
pub fn read_len(source: &mut impl BufRead) -> Result<usize, CodecError> {
    let len = read_u64(source)?;
    if len > MAX_SEQUENCE_LEN {
        return Err(CodecError::LengthLimit { len });
    }
    usize::try_from(len).map_err(|_| CodecError::IntegerOverflow { target: "usize" })
}

/// Writes a length prefixed byte blob.
pub fn write_bytes(target: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    write_usize(target, bytes.len())?;
    target.write_all(bytes)
}

/// Reads a byte blob written by [`write_bytes`].
pub fn read_bytes(source: &mut impl BufRead) -> Result<Vec<u8>, CodecError> {
    let len = read_len(source)?;
    let mut bytes = vec![];
    // Grows with the actual input instead of trusting the declared length.
    let read = source.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if read != len {
        return Err(CodecError::UnexpectedEnd);
    }
    Ok(bytes)
}

/// Writes a length prefixed UTF-8 string.
pub fn write_str(target: &mut impl Write, value: &str) -> io::Result<()> {
    write_bytes(target, value.as_bytes())
}

/// Reads a string written by [`write_str`].
pub fn read_string(source: &mut impl BufRead) -> Result<String, CodecError> {
    String::from_utf8(read_bytes(source)?).map_err(|_| CodecError::InvalidUtf8)
}

/// Writes a length prefixed sequence using a callback per item.
pub fn write_seq<W: Write, T>(
    target: &mut W,
    items: &[T],
    mut write_item: impl FnMut(&mut W, &T) -> io::Result<()>,
) -> io::Result<()> {
    write_usize(&mut *target, items.len())?;
    for item in items {
        write_item(&mut *target, item)?;
    }
    Ok(())
}

/// Reads a sequence written by [`write_seq`].
pub fn read_seq<R: BufRead, T>(
    source: &mut R,
    mut read_item: impl FnMut(&mut R) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    let len = read_len(&mut *source)?;
    let mut items = Vec::with_capacity(len.min(1 << 12));
    for _ in 0..len {
        items.push(read_item(&mut *source)?);
    }
    Ok(items)
}

/// Writes a sequence of signed integers.
pub fn write_i64s(target: &mut impl Write, values: &[i64]) -> io::Result<()> {
    write_seq(target, values, |target, &value| write_i64(target, value))
}

/// Reads a sequence of signed integers.
pub fn read_i64s(source: &mut impl BufRead) -> Result<Vec<i64>, CodecError> {
    read_seq(source, |source| read_i64(source))
}

/// Writes a sequence of booleans.
pub fn write_bools(target: &mut impl Write, values: &[bool]) -> io::Result<()> {
    write_seq(target, values, |target, &value| write_bool(target, value))
}

/// Reads a sequence of booleans.
pub fn read_bools(source: &mut impl BufRead) -> Result<Vec<bool>, CodecError> {
    read_seq(source, |source| read_bool(source))
}
