//! Text encoding and record padding
//!
//! Each character becomes two bytes, high byte first. The plate record uses
//! the controller's local-script scheme (see [`encode_plate_text`]); the other
//! records are plain UTF-16BE. Records are padded to their fixed width with
//! filler tokens in front of the text, never truncated.

use crate::error::SignError;

/// Width of the plate record
pub const PLATE_RECORD_LEN: usize = 14;

/// Width of the info-line record
pub const INFO_RECORD_LEN: usize = 16;

/// Filler token the controller renders as a blank cell
const FILLER: [u8; 2] = [0x00, 0x20];

/// Local-script marker byte
const LOCAL_SCRIPT: u8 = 0x0E;

fn is_thai(c: char) -> bool {
    ('\u{0E00}'..='\u{0E7F}').contains(&c)
}

/// Encode a licence plate with the controller's local-script rule.
///
/// - ASCII: `0x0E` tag when the previous character was non-ASCII, else `0x00`.
/// - Non-ASCII: low byte of the code point, tagged `0x00` for the first Thai
///   character in the string and `0x0E` for every other non-ASCII character.
pub fn encode_plate_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    let mut prev_local = false;
    let mut seen_thai = false;

    for c in text.chars() {
        let code = c as u32;
        if code < 0x80 {
            out.push(if prev_local { LOCAL_SCRIPT } else { 0x00 });
            out.push(code as u8);
            prev_local = false;
        } else {
            if is_thai(c) && !seen_thai {
                out.push(0x00);
                seen_thai = true;
            } else {
                out.push(LOCAL_SCRIPT);
            }
            out.push((code & 0xFF) as u8);
            prev_local = true;
        }
    }
    out
}

/// Plain UTF-16BE
pub fn encode_utf16be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

/// Pad an encoded plate to exactly 14 bytes
pub fn pad_plate(data: &[u8]) -> Result<Vec<u8>, SignError> {
    let len = data.len();
    if len > PLATE_RECORD_LEN {
        return Err(SignError::PlateTooLong { len });
    }
    if len == PLATE_RECORD_LEN {
        return Ok(data.to_vec());
    }

    let mut out = Vec::with_capacity(PLATE_RECORD_LEN);
    if len < 10 {
        out.extend_from_slice(&FILLER);
        out.extend_from_slice(&FILLER);
    } else {
        out.extend_from_slice(&FILLER);
    }
    out.resize(PLATE_RECORD_LEN - len, 0x00);
    out.extend_from_slice(data);
    Ok(out)
}

/// Pad an encoded info line to exactly 16 bytes
pub fn pad_info(data: &[u8]) -> Result<Vec<u8>, SignError> {
    let len = data.len();
    if len > INFO_RECORD_LEN {
        return Err(SignError::InfoTooLong { len });
    }
    if len == INFO_RECORD_LEN {
        return Ok(data.to_vec());
    }

    let mut out = Vec::with_capacity(INFO_RECORD_LEN);
    match len {
        14 => {}
        12 => out.extend_from_slice(&FILLER),
        _ => {
            out.extend_from_slice(&FILLER);
            out.extend_from_slice(&FILLER);
        }
    }
    out.resize(INFO_RECORD_LEN - len, 0x00);
    out.extend_from_slice(data);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plate_thai_quirk() {
        let bytes = encode_plate_text("1กข2345");
        assert_eq!(
            bytes,
            vec![0x00, 0x31, 0x00, 0x01, 0x0E, 0x02, 0x0E, 0x32, 0x00, 0x33, 0x00, 0x34, 0x00, 0x35]
        );
    }

    #[test]
    fn test_plate_ascii_only() {
        assert_eq!(encode_plate_text("AB1"), vec![0x00, 0x41, 0x00, 0x42, 0x00, 0x31]);
    }

    #[test]
    fn test_plate_second_thai_run_keeps_local_tag() {
        // Only the very first Thai character is tagged 0x00.
        let bytes = encode_plate_text("ก1ข");
        assert_eq!(bytes, vec![0x00, 0x01, 0x0E, 0x31, 0x0E, 0x02]);
    }

    #[test]
    fn test_utf16be() {
        assert_eq!(
            encode_utf16be("JPARK"),
            vec![0x00, 0x4A, 0x00, 0x50, 0x00, 0x41, 0x00, 0x52, 0x00, 0x4B]
        );
        assert_eq!(encode_utf16be("ก"), vec![0x0E, 0x01]);
    }

    #[test]
    fn test_pad_plate_short() {
        // 8 bytes -> filler, filler, 2 zeros, data
        let data = encode_utf16be("AB12");
        let padded = pad_plate(&data).unwrap();
        assert_eq!(padded.len(), 14);
        assert_eq!(&padded[..6], &[0x00, 0x20, 0x00, 0x20, 0x00, 0x00]);
        assert_eq!(&padded[6..], data.as_slice());
    }

    #[test]
    fn test_pad_plate_ten_and_twelve() {
        let ten = encode_utf16be("AB123");
        let padded = pad_plate(&ten).unwrap();
        assert_eq!(&padded[..4], &[0x00, 0x20, 0x00, 0x00]);
        assert_eq!(&padded[4..], ten.as_slice());

        let twelve = encode_utf16be("AB1234");
        let padded = pad_plate(&twelve).unwrap();
        assert_eq!(&padded[..2], &[0x00, 0x20]);
        assert_eq!(&padded[2..], twelve.as_slice());
    }

    #[test]
    fn test_pad_plate_rejects_overflow() {
        let data = encode_utf16be("ABCDEFGH");
        assert_eq!(pad_plate(&data), Err(SignError::PlateTooLong { len: 16 }));
    }

    #[test]
    fn test_pad_info_branches() {
        let fourteen = encode_utf16be("1234567");
        assert_eq!(&pad_info(&fourteen).unwrap()[..2], &[0x00, 0x00]);

        let twelve = encode_utf16be("50 THB");
        assert_eq!(&pad_info(&twelve).unwrap()[..4], &[0x00, 0x20, 0x00, 0x00]);

        let ten = encode_utf16be("5 THB");
        let padded = pad_info(&ten).unwrap();
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[..6], &[0x00, 0x20, 0x00, 0x20, 0x00, 0x00]);
        assert_eq!(&padded[6..], ten.as_slice());
    }

    #[test]
    fn test_pad_info_rejects_overflow() {
        let data = encode_utf16be("12345 THB");
        assert_eq!(pad_info(&data), Err(SignError::InfoTooLong { len: 18 }));
    }
}
