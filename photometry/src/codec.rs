// Triangle index to colour codec.
//
// An index is stored as `index + 1` in base 256 with the most significant
// byte in the red channel: (r, g, b) = (v >> 16, v >> 8, v) & 0xFF. Black
// is reserved for the background, so triangle 0 is encoded as (0, 0, 1).

use image::Rgb;

use base::defs::{Error, ErrorKind::*, Result};

pub const MAX_INDEX: usize = (1 << 24) - 2;

pub fn encode_index(index: usize) -> Result<Rgb<u8>> {
    if index > MAX_INDEX {
        let desc = format!("triangle index {} cannot be colour-encoded", index);
        return Err(Error::new(BadOperation, desc));
    }
    let v = index as u32 + 1;
    Ok(Rgb([(v >> 16) as u8, (v >> 8) as u8, v as u8]))
}

pub fn decode_index(color: &Rgb<u8>) -> Option<usize> {
    let [r, g, b] = color.0;
    let v = (r as usize) << 16 | (g as usize) << 8 | b as usize;
    v.checked_sub(1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_index() {
        assert_eq!(encode_index(0).unwrap(), Rgb([0, 0, 1]));
        assert_eq!(encode_index(255).unwrap(), Rgb([0, 1, 0]));
        assert_eq!(encode_index(0x123455).unwrap(), Rgb([0x12, 0x34, 0x56]));
        assert_eq!(encode_index(MAX_INDEX).unwrap(), Rgb([255, 255, 255]));

        let err = encode_index(MAX_INDEX + 1).unwrap_err();
        assert_eq!(err.kind, BadOperation);
    }

    #[test]
    fn test_decode_index() {
        assert_eq!(decode_index(&Rgb([0, 0, 0])), None);
        assert_eq!(decode_index(&Rgb([0, 0, 1])), Some(0));
        for index in [1, 256, 65535, 65536, 1234567, MAX_INDEX] {
            let color = encode_index(index).unwrap();
            assert_eq!(decode_index(&color), Some(index));
        }
    }
}
