//! Purpose: Translate backslash escape notation to raw bytes and back.
//! Exports: `decode`, `encode`.
//! Role: Shared codec for separator/stand-in operands and BLOB column output.
//! Invariants: Decoding never fails; malformed escapes degrade to literal bytes.
//! Invariants: Encoded output contains only printable ASCII; `\xHH` hex is uppercase.

use bstr::BString;

// Letter/control pairs recognized in both directions.
const ESCAPE_TABLE: &[(u8, u8)] = &[
    (b'0', 0x00),
    (b'a', 0x07),
    (b'b', 0x08),
    (b'e', 0x1B),
    (b'f', 0x0C),
    (b'n', 0x0A),
    (b'r', 0x0D),
    (b't', 0x09),
    (b'v', 0x0B),
];

fn letter_to_byte(letter: u8) -> Option<u8> {
    ESCAPE_TABLE
        .iter()
        .find(|(entry, _)| *entry == letter)
        .map(|(_, byte)| *byte)
}

fn byte_to_letter(byte: u8) -> Option<u8> {
    ESCAPE_TABLE
        .iter()
        .find(|(_, entry)| *entry == byte)
        .map(|(letter, _)| *letter)
}

/// Expand backslash escapes in `input` into the raw bytes they denote.
///
/// `\` followed by a table letter becomes the matching control byte. `\\`
/// becomes a single backslash. A backslash before any other byte is dropped
/// and the byte kept as-is; a trailing backslash is kept literally.
pub fn decode(input: &[u8]) -> BString {
    let mut out = Vec::with_capacity(input.len());
    let mut bytes = input.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match bytes.next() {
            Some(next) => out.push(letter_to_byte(next).unwrap_or(next)),
            None => out.push(b'\\'),
        }
    }
    BString::from(out)
}

/// Render raw bytes as printable backslash notation.
///
/// Backslash becomes `\\`, other printable ASCII passes through, table
/// control bytes become `\` plus their letter, and everything else becomes
/// `\xHH`. Decoding the result does not restore `\xHH` bytes; that
/// asymmetry is part of the output contract.
pub fn encode(input: &[u8]) -> BString {
    let mut out = Vec::with_capacity(input.len());
    for &byte in input {
        if byte == b'\\' {
            out.extend_from_slice(b"\\\\");
        } else if (0x20..=0x7E).contains(&byte) {
            out.push(byte);
        } else if let Some(letter) = byte_to_letter(byte) {
            out.push(b'\\');
            out.push(letter);
        } else {
            out.extend_from_slice(format!("\\x{byte:02X}").as_bytes());
        }
    }
    BString::from(out)
}
