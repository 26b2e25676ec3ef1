//! Frame assembly
//!
//! Layout (all constants are part of the controller contract):
//!
//! ```text
//! header    44 bytes
//! record 1  26-byte prefix + title     (10 bytes, "JPARK")
//! record 2  26-byte prefix + plate     (14 bytes)
//! record 3  26-byte prefix + info line (16 bytes)
//! record 4  26-byte prefix + greeting  (16 bytes)
//! trailer    5 bytes
//! ```

use parkgate_core::Direction;

use crate::encode::{
    encode_plate_text, encode_utf16be, pad_info, pad_plate, INFO_RECORD_LEN, PLATE_RECORD_LEN,
};
use crate::error::SignError;

/// Total size of an encoded frame
pub const FRAME_LEN: usize = 209;

const HEADER: [u8; 44] = [
    0x55, 0xAA, 0x00, 0x00, 0x01, 0x00, 0x00, 0xDB, 0x00, 0x00, //
    0xB9, 0x00, 0x00, 0x00, 0x01, 0x01, 0xB9, 0x00, 0x00, 0x00, 0x01, 0x01, 0xB8, 0x00, 0x00, 0x00,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

const TITLE_PREFIX: [u8; 26] = [
    0x00, 0x01, 0x24, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x3F, 0x00, 0x0F, //
    0x00, 0x04, 0x00, 0x00, 0x01, 0x00, 0x0A, 0x05, //
    0x11, 0x0A, 0x00, 0x00,
];

const PLATE_PREFIX: [u8; 26] = [
    0x00, 0x02, 0x28, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x10, 0x00, 0x3F, 0x00, 0x1F, //
    0x00, 0x02, 0x00, 0x00, 0x01, 0x00, 0x0A, 0x05, //
    0x10, 0x10, 0x00, 0x00,
];

const INFO_PREFIX: [u8; 26] = [
    0x00, 0x03, 0x2A, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x20, 0x00, 0x3F, 0x00, 0x2F, //
    0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x0A, 0x05, //
    0x10, 0x10, 0x00, 0x00,
];

const GREETING_PREFIX: [u8; 26] = [
    0x00, 0x04, 0x2A, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x30, 0x00, 0x3F, 0x00, 0x3F, //
    0x00, 0x04, 0x00, 0x3F, 0x20, 0x00, 0x14, 0x02, //
    0x10, 0x10, 0x00, 0x00,
];

const TRAILER: [u8; 5] = [0x00, 0x00, 0x00, 0x0D, 0x0A];

const TITLE: &str = "JPARK";

/// What the sign should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Blank plate and info line
    Clear,
    /// Plate plus info line, used at the main gates
    Main,
    /// Plate only, used at zoning barriers
    Zone,
}

/// Input of one sign update
#[derive(Debug, Clone, Copy)]
pub struct SignContent<'a> {
    pub plate: &'a str,
    pub direction: Direction,
    pub mode: SignMode,
    /// Third line, e.g. `"40 THB"`; blank lines render as empty
    pub info_line: &'a str,
}

impl<'a> SignContent<'a> {
    pub fn new(plate: &'a str, direction: Direction, mode: SignMode) -> Self {
        Self {
            plate,
            direction,
            mode,
            info_line: "",
        }
    }

    pub fn with_info(mut self, info_line: &'a str) -> Self {
        self.info_line = info_line;
        self
    }
}

fn greeting(direction: Direction) -> Vec<u8> {
    match direction {
        Direction::Entrance => {
            let mut record = encode_utf16be("Welcome");
            record.extend_from_slice(&[0x00, 0x00]);
            record
        }
        Direction::Exit => encode_utf16be("ThankYou"),
    }
}

/// Build the datagram payload for `content`
pub fn encode_frame(content: &SignContent<'_>) -> Result<Vec<u8>, SignError> {
    let plate = match content.mode {
        SignMode::Clear => vec![0u8; PLATE_RECORD_LEN],
        SignMode::Main | SignMode::Zone => pad_plate(&encode_plate_text(content.plate))?,
    };

    let info = match content.mode {
        SignMode::Main if !content.info_line.trim().is_empty() => {
            pad_info(&encode_utf16be(content.info_line))?
        }
        _ => vec![0u8; INFO_RECORD_LEN],
    };

    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.extend_from_slice(&HEADER);
    frame.extend_from_slice(&TITLE_PREFIX);
    frame.extend_from_slice(&encode_utf16be(TITLE));
    frame.extend_from_slice(&PLATE_PREFIX);
    frame.extend_from_slice(&plate);
    frame.extend_from_slice(&INFO_PREFIX);
    frame.extend_from_slice(&info);
    frame.extend_from_slice(&GREETING_PREFIX);
    frame.extend_from_slice(&greeting(content.direction));
    frame.extend_from_slice(&TRAILER);

    debug_assert_eq!(frame.len(), FRAME_LEN);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLATE_OFFSET: usize = 44 + 26 + 10 + 26;
    const INFO_OFFSET: usize = PLATE_OFFSET + 14 + 26;
    const GREETING_OFFSET: usize = INFO_OFFSET + 16 + 26;

    /// Frame for plate "1กข2345", entrance, main mode, no info line
    const GOLDEN_ENTRANCE: &str = "\
        55aa00000100 00db0000\
        b900000001 01b900000001 01b8000000\
        04000000000000000000000000000000\
        0000\
        0001240000000e000000003f000f 000400000100 0a05 110a0000\
        004a005000410052004b\
        0002280000000e000010003f001f 000200000100 0a05 10100000\
        00310001 0e020e32 00330034 0035\
        00032a0000000e000020003f002f 000100000100 0a05 10100000\
        00000000000000000000000000000000\
        00042a0000000e000030003f003f 0004003f2000 1402 10100000\
        00570065006c0063006f006d00650000\
        000000 0d0a";

    fn golden(hex_text: &str) -> Vec<u8> {
        let clean: String = hex_text.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(clean).unwrap()
    }

    #[test]
    fn test_golden_entrance_frame() {
        let content = SignContent::new("1กข2345", Direction::Entrance, SignMode::Main);
        let frame = encode_frame(&content).unwrap();
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(frame, golden(GOLDEN_ENTRANCE));
    }

    #[test]
    fn test_record_lengths_match_prefix() {
        // Third byte of each prefix is 26 + payload width.
        assert_eq!(TITLE_PREFIX[2] as usize, 26 + 10);
        assert_eq!(PLATE_PREFIX[2] as usize, 26 + PLATE_RECORD_LEN);
        assert_eq!(INFO_PREFIX[2] as usize, 26 + INFO_RECORD_LEN);
        assert_eq!(GREETING_PREFIX[2] as usize, 26 + 16);
    }

    #[test]
    fn test_exit_frame_with_amount() {
        let content =
            SignContent::new("AB1234", Direction::Exit, SignMode::Main).with_info("40 THB");
        let frame = encode_frame(&content).unwrap();
        assert_eq!(frame.len(), FRAME_LEN);

        let info = &frame[INFO_OFFSET..INFO_OFFSET + 16];
        let mut expected = vec![0x00, 0x20, 0x00, 0x00];
        expected.extend(encode_utf16be("40 THB"));
        assert_eq!(info, expected.as_slice());

        let greeting = &frame[GREETING_OFFSET..GREETING_OFFSET + 16];
        assert_eq!(greeting, encode_utf16be("ThankYou").as_slice());
    }

    #[test]
    fn test_clear_mode_blanks_plate_and_info() {
        let content =
            SignContent::new("1กข2345", Direction::Exit, SignMode::Clear).with_info("40 THB");
        let frame = encode_frame(&content).unwrap();
        assert_eq!(&frame[PLATE_OFFSET..PLATE_OFFSET + 14], &[0u8; 14]);
        assert_eq!(&frame[INFO_OFFSET..INFO_OFFSET + 16], &[0u8; 16]);
    }

    #[test]
    fn test_zone_mode_drops_info_line() {
        let content =
            SignContent::new("AB12", Direction::Entrance, SignMode::Zone).with_info("0 THB");
        let frame = encode_frame(&content).unwrap();
        assert_eq!(&frame[INFO_OFFSET..INFO_OFFSET + 16], &[0u8; 16]);
        assert_ne!(&frame[PLATE_OFFSET..PLATE_OFFSET + 14], &[0u8; 14]);
    }

    #[test]
    fn test_short_plate_is_padded_in_place() {
        let frame = encode_frame(&SignContent::new("A1", Direction::Entrance, SignMode::Main))
            .unwrap();
        assert_eq!(frame.len(), FRAME_LEN);
        let plate = &frame[PLATE_OFFSET..PLATE_OFFSET + 14];
        assert_eq!(&plate[..4], &[0x00, 0x20, 0x00, 0x20]);
        assert_eq!(&plate[10..], &[0x00, 0x41, 0x00, 0x31]);
    }

    #[test]
    fn test_oversized_records_are_rejected() {
        let long_plate = SignContent::new("ABCD12345", Direction::Entrance, SignMode::Main);
        assert_eq!(
            encode_frame(&long_plate),
            Err(SignError::PlateTooLong { len: 18 })
        );

        let long_info =
            SignContent::new("AB12", Direction::Exit, SignMode::Main).with_info("123456 THB");
        assert_eq!(
            encode_frame(&long_info),
            Err(SignError::InfoTooLong { len: 20 })
        );
    }
}
