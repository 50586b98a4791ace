//! Scanline conversion between DPX file words and the in-memory layout.
//!
//! | Bits | Packing | File word            | Memory word          |
//! |------|---------|----------------------|----------------------|
//! | 10   | Type A  | `R<<22 \| G<<12 \| B<<2` | unchanged         |
//! | 10   | Type B  | `R<<20 \| G<<10 \| B`    | word `<< 2`       |
//! | 12   | Type A  | `v<<4` in 16 bits    | unchanged            |
//! | 12   | Type B  | `v` in 16 bits       | word `<< 4`          |
//!
//! All conversions run on host-order words, after endian conversion.

use byteorder::{ByteOrder, NativeEndian};

/// Shifts Type B (pad-high) words into the memory layout.
pub fn unpack_type_b(line: &mut [u8], bit_depth: u8) {
    match bit_depth {
        10 => {
            for word in line.chunks_exact_mut(4) {
                let v = NativeEndian::read_u32(word);
                NativeEndian::write_u32(word, v << 2);
            }
        }
        12 => {
            for word in line.chunks_exact_mut(2) {
                let v = NativeEndian::read_u16(word);
                NativeEndian::write_u16(word, v << 4);
            }
        }
        _ => {}
    }
}

/// Clears the low nibble of 16-bit words so they hold Type A 12-bit values.
pub fn pack_12bit(line: &mut [u8]) {
    for word in line.chunks_exact_mut(2) {
        let v = NativeEndian::read_u16(word);
        NativeEndian::write_u16(word, v & 0xFFF0);
    }
}

/// Copies every `factor`-th pixel of `src` into `dst`.
pub fn subsample(src: &[u8], dst: &mut [u8], pixel_bytes: usize, factor: usize) {
    if factor <= 1 {
        dst.copy_from_slice(&src[..dst.len()]);
        return;
    }
    for (i, out) in dst.chunks_exact_mut(pixel_bytes).enumerate() {
        let s = i * factor * pixel_bytes;
        out.copy_from_slice(&src[s..s + pixel_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_b_10bit() {
        let (r, g, b) = (1023u32, 512, 1);
        let mut line = ((r << 20) | (g << 10) | b).to_ne_bytes();
        unpack_type_b(&mut line, 10);
        let v = u32::from_ne_bytes(line);
        assert_eq!(v >> 22, r);
        assert_eq!((v >> 12) & 0x3FF, g);
        assert_eq!((v >> 2) & 0x3FF, b);
        assert_eq!(v & 3, 0);
    }

    #[test]
    fn test_type_b_12bit() {
        let mut line = [0u8; 4];
        NativeEndian::write_u16(&mut line[..2], 4095);
        NativeEndian::write_u16(&mut line[2..], 1);
        unpack_type_b(&mut line, 12);
        assert_eq!(NativeEndian::read_u16(&line[..2]), 0xFFF0);
        assert_eq!(NativeEndian::read_u16(&line[2..]), 0x0010);
    }

    #[test]
    fn test_pack_12bit() {
        let mut line = 0xABCDu16.to_ne_bytes();
        pack_12bit(&mut line);
        assert_eq!(u16::from_ne_bytes(line), 0xABC0);
    }

    #[test]
    fn test_subsample() {
        let src = [1, 1, 2, 2, 3, 3, 4, 4, 5, 5];
        let mut dst = [0u8; 6];
        subsample(&src, &mut dst, 2, 2);
        assert_eq!(dst, [1, 1, 3, 3, 5, 5]);
    }
}
