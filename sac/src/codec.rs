use crate::{
    CodecError, Header, Result, SacBlob, DTYPE_I16, FLAG_SINGLE_ARRAY, HEADER_LEN, MAGIC,
};

/// Encodes a single signed-difference array as a SAC blob (`SINGLE_ARRAY` set).
pub fn encode_single_array(diff: &[i16], width: u32, height: u32) -> Vec<u8> {
    encode_header_and_payload(FLAG_SINGLE_ARRAY, diff, None, width, height)
}

/// Encodes one or two signed-difference arrays per §3/§4.2. Per Open
/// Question (c), this crate always emits full per-channel arrays, so
/// `array_b` is only used by callers that genuinely have a second plane
/// (for example a two-plane hi/lo packing handled elsewhere); ordinary
/// per-channel encoding goes through `encode_single_array`.
pub fn encode(array_a: &[i16], array_b: Option<&[i16]>, width: u32, height: u32) -> Vec<u8> {
    let flags = if array_b.is_some() { 0 } else { FLAG_SINGLE_ARRAY };
    encode_header_and_payload(flags, array_a, array_b, width, height)
}

fn encode_header_and_payload(
    flags: u8,
    array_a: &[i16],
    array_b: Option<&[i16]>,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let arrays_count: u8 = if array_b.is_some() { 2 } else { 1 };
    let length_a = array_a.len() as u32;
    let length_b = array_b.map(|b| b.len() as u32).unwrap_or(length_a);

    let mut out = Vec::with_capacity(HEADER_LEN + array_a.len() * 2 + array_b.map_or(0, |b| b.len() * 2));
    out.extend_from_slice(&MAGIC);
    out.push(flags);
    out.push(DTYPE_I16);
    out.push(arrays_count);
    out.push(0); // reserved
    out.extend_from_slice(&length_a.to_le_bytes());
    out.extend_from_slice(&length_b.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());

    for &sample in array_a {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    if let Some(b) = array_b {
        for &sample in b {
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
    out
}

/// Parses only the 24-byte header, validating magic/dtype/arrays_count
/// consistency but not payload length. Useful for the HTTP layer, which
/// needs `X-SAC-*` response headers before streaming the body.
pub fn decode_header(data: &[u8]) -> Result<Header> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::TruncatedHeader(data.len()));
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&data[0..4]);
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }

    let flags = data[4];
    let dtype_code = data[5];
    if dtype_code != DTYPE_I16 {
        return Err(CodecError::UnsupportedDtype(dtype_code));
    }
    let arrays_count = data[6];
    // data[7] is reserved.

    let single = flags & FLAG_SINGLE_ARRAY != 0;
    let expected_count = if single { 1 } else { 2 };
    if arrays_count != expected_count {
        return Err(CodecError::ArraysCountMismatch {
            expected: expected_count,
            actual: arrays_count,
        });
    }

    let length_a = u32::from_le_bytes(data[8..12].try_into().unwrap());
    let length_b = u32::from_le_bytes(data[12..16].try_into().unwrap());
    let width = u32::from_le_bytes(data[16..20].try_into().unwrap());
    let height = u32::from_le_bytes(data[20..24].try_into().unwrap());

    Ok(Header {
        flags,
        dtype_code,
        arrays_count,
        length_a,
        length_b,
        width,
        height,
    })
}

/// Full decode: header plus payload array(s), per §4.2. No partial decode
/// on error — any malformed header or truncated payload is fatal.
pub fn decode(data: &[u8]) -> Result<SacBlob> {
    let header = decode_header(data)?;

    let body = &data[HEADER_LEN..];
    let expected_a_bytes = header.length_a as usize * 2;
    if body.len() < expected_a_bytes {
        return Err(CodecError::TruncatedPayload {
            expected: expected_a_bytes,
            actual: body.len(),
        });
    }
    let array_a = read_i16_array(&body[..expected_a_bytes]);

    let array_b = if header.is_single_array() {
        None
    } else {
        let b_bytes = &body[expected_a_bytes..];
        let expected_b_bytes = header.length_b as usize * 2;
        if b_bytes.len() < expected_b_bytes {
            return Err(CodecError::TruncatedPayload {
                expected: expected_b_bytes,
                actual: b_bytes.len(),
            });
        }
        Some(read_i16_array(&b_bytes[..expected_b_bytes]))
    };

    if let (Some(width), Some(height)) = non_zero_dims(&header) {
        let channels_a = header.length_a as usize / (width * height).max(1);
        let expected = width * height * channels_a.max(1);
        if header.length_a as usize != expected {
            return Err(CodecError::DimensionMismatch {
                expected,
                actual: header.length_a as usize,
            });
        }
    }

    Ok(SacBlob {
        header,
        array_a,
        array_b,
    })
}

fn non_zero_dims(header: &Header) -> (Option<usize>, Option<usize>) {
    if header.width == 0 || header.height == 0 {
        (None, None)
    } else {
        (Some(header.width as usize), Some(header.height as usize))
    }
}

fn read_i16_array(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_array_round_trip() {
        let diff: Vec<i16> = vec![-5, 0, 127, -128, 300];
        let blob = encode_single_array(&diff, 0, 0);
        let decoded = decode(&blob).expect("decode");
        assert!(decoded.header.is_single_array());
        assert_eq!(decoded.header.arrays_count, 1);
        assert_eq!(decoded.array_a, diff);
        assert!(decoded.array_b.is_none());
    }

    #[test]
    fn two_array_round_trip() {
        let a: Vec<i16> = vec![1, 2, 3, 4];
        let b: Vec<i16> = vec![-1, -2, -3, -4];
        let blob = encode(&a, Some(&b), 2, 2);
        let decoded = decode(&blob).expect("decode");
        assert!(!decoded.header.is_single_array());
        assert_eq!(decoded.array_a, a);
        assert_eq!(decoded.array_b, Some(b));
        assert_eq!(decoded.header.width, 2);
        assert_eq!(decoded.header.height, 2);
    }

    #[test]
    fn header_is_well_formed() {
        let diff: Vec<i16> = vec![0; 16];
        let blob = encode_single_array(&diff, 4, 4);
        let header = decode_header(&blob).expect("header");
        assert_eq!(&blob[0..4], &MAGIC);
        assert_eq!(header.dtype_code, DTYPE_I16);
        assert_eq!(blob.len() - HEADER_LEN, diff.len() * 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut blob = encode_single_array(&[1, 2], 0, 0);
        blob[0] = b'X';
        assert!(matches!(decode(&blob), Err(CodecError::BadMagic(_))));
    }

    #[test]
    fn rejects_truncated_header() {
        let blob = vec![0u8; 10];
        assert!(matches!(
            decode(&blob),
            Err(CodecError::TruncatedHeader(10))
        ));
    }

    #[test]
    fn rejects_arrays_count_mismatch() {
        let mut blob = encode_single_array(&[1, 2], 0, 0);
        blob[6] = 2; // claims two arrays despite SINGLE_ARRAY flag
        assert!(matches!(
            decode(&blob),
            Err(CodecError::ArraysCountMismatch { .. })
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut blob = encode_single_array(&[1, 2, 3, 4], 0, 0);
        blob.truncate(blob.len() - 2);
        assert!(matches!(
            decode(&blob),
            Err(CodecError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let diff: Vec<i16> = vec![0; 10]; // 10 samples, but header will claim 4x4=16
        let blob = encode_single_array(&diff, 4, 4);
        assert!(matches!(
            decode(&blob),
            Err(CodecError::DimensionMismatch { .. })
        ));
    }
}
