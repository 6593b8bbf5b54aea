//! Variable length integer encoding for unsigned values.
//!
//! Signed values use LEB128 (see [`crate::primitives`]), but lengths, ids and tags are always
//! non-negative and use this faster encoding. It needs the same amount of bytes as LEB128 for each
//! input.
//!
//! Numbers are encoded like this:
//! ```text
//! 1xxxxxxx for up to 7 bits
//! 01xxxxxx xxxxxxxx for up to 14 bits
//! 001xxxxx xxxxxxxx xxxxxxxx for up to 21 bits
//! ...
//! ```
//!
//! The x-bits store the number from LSB to MSB. The length of an encoded number can be determined
//! from its first or first two bytes.
use std::io::{self, BufRead, Write};

/// Write an encoded 64 bit number.
pub fn write_u64(target: &mut impl Write, value: u64) -> io::Result<()> {
    let bits = 64 - value.leading_zeros();
    let blocks = (bits * (64 / 7)) / 64;
    if value < (1 << (8 * 7)) {
        let data = ((value << 1) | 1) << blocks;
        target.write_all(&data.to_le_bytes()[..(blocks + 1) as usize])
    } else {
        let lo_data = ((value << 1) | 1) << blocks;
        let hi_data = value >> (64 - (blocks + 1));

        target.write_all(&lo_data.to_le_bytes())?;
        target.write_all(&hi_data.to_le_bytes()[..(blocks as usize) + 1 - 8])
    }
}

/// Decode a number when at least 16 bytes of lookahead are available.
fn read_u64_fast(bytes: &[u8]) -> (u64, usize) {
    let mut lo_bytes = [0; 8];
    lo_bytes.copy_from_slice(&bytes[..8]);
    let lo_data = u64::from_le_bytes(lo_bytes);

    let len = (lo_data | (1 << 9)).trailing_zeros() + 1;

    if len <= 8 {
        let result = lo_data & (!0u64 >> (64 - 8 * len));
        (result >> len, len as usize)
    } else {
        let mut hi_bytes = [0; 8];
        hi_bytes.copy_from_slice(&bytes[8..16]);
        let hi_data = u64::from_le_bytes(hi_bytes) & (!0u64 >> (64 - 8 * (len - 8)));

        ((lo_data >> len) | (hi_data << (64 - len)), len as usize)
    }
}

/// Read an encoded 64 bit number from a buffered reader.
///
/// This uses [`read_u64_fast`] if the remaining buffer is larger than 16 bytes and falls back to a
/// slower implementation otherwise.
pub fn read_u64(source: &mut impl BufRead) -> io::Result<u64> {
    let buf = source.fill_buf()?;
    if buf.len() >= 16 {
        let (value, advance) = read_u64_fast(&buf[..16]);
        source.consume(advance);
        Ok(value)
    } else {
        let mut scan = 1 << 9;
        let mut byte: [u8; 1] = [0];
        let mut begin = 1;
        source.read_exact(&mut byte[..])?;
        let mut result = byte[0] as u64;
        scan |= byte[0] as u64;
        if byte[0] == 0 {
            begin += 1;
            source.read_exact(&mut byte[..])?;
            result |= (byte[0] as u64) << 8;
            scan |= (byte[0] as u64) << 8;
        }
        let len = scan.trailing_zeros() + 1;

        result >>= len;

        for i in begin..len {
            source.read_exact(&mut byte[..])?;
            result |= (byte[0] as u64) << (8 * i - len);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn encoded_lengths() {
        for &(value, len) in [(0, 1), (127, 1), (128, 2), (1 << 14, 3), (!0u64, 10)].iter() {
            let mut buf = vec![];
            write_u64(&mut buf, value).unwrap();
            assert_eq!(buf.len(), len, "length of {}", value);
        }
    }

    proptest! {
        #[test]
        fn roundtrip(
            numbers in prop::collection::vec(prop::num::u64::ANY, 0..10_000)
        ) {
            let mut buf = vec![];

            for &num in numbers.iter() {
                write_u64(&mut buf, num)?;
            }

            let mut read = std::io::BufReader::with_capacity(128, &buf[..]);

            let mut out = vec![];

            while let Ok(num) = read_u64(&mut read) {
                out.push(num)
            }

            prop_assert_eq!(numbers, out);
        }
    }
}
