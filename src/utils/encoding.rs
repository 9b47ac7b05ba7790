use crate::error::{HwpError, Result};
use encoding_rs::UTF_16LE;

/// Paragraph break character inside paragraph text.
pub const CH_PARA_BREAK: u16 = 13;
/// Forced line break character.
pub const CH_LINE_BREAK: u16 = 10;
/// Extended control that anchors a drawing object or table.
pub const CH_OBJECT_ANCHOR: u16 = 11;
/// Extended control that anchors section/column definitions.
pub const CH_SECTION_COLUMN_DEF: u16 = 2;
/// Inline control carrying a tab stop.
pub const CH_TAB: u16 = 9;

pub fn utf16le_to_string(data: &[u8]) -> Result<String> {
    let (cow, _, had_errors) = UTF_16LE.decode(data);
    if had_errors {
        return Err(HwpError::Encoding("Invalid UTF-16LE data".to_string()));
    }
    Ok(cow.into_owned())
}

pub fn string_to_utf16le(s: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(s.len() * 2);
    for ch in s.encode_utf16() {
        result.extend_from_slice(&ch.to_le_bytes());
    }
    result
}

pub fn bytes_to_units(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

pub fn units_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len() * 2);
    for u in units {
        out.extend_from_slice(&u.to_le_bytes());
    }
    out
}

/// Width in 16-bit units of a paragraph-text code point.
///
/// Codes below U+0020 are inline controls. Extended and inline controls
/// occupy 8 units: the control character, a two-unit control id, four
/// reserved units, and the control character repeated. Character controls
/// (0, line break, paragraph break, hyphen, the fixed/space family) occupy
/// a single unit, like every printable character. Mis-counting any of these
/// corrupts every downstream character offset, so the table is authoritative.
pub fn control_unit_width(code: u16) -> usize {
    match code {
        1..=9 | 11 | 12 | 14..=23 => 8,
        _ => 1,
    }
}

/// Convert wire paragraph text (UTF-16 units with embedded controls) into
/// plain display text. Controls are dropped except tab and forced line
/// break; the paragraph break terminates a paragraph and is not part of
/// its visible text.
pub fn wire_units_to_plain(units: &[u16]) -> Result<String> {
    let mut plain: Vec<u16> = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let u = units[i];
        if u < 0x20 {
            match u {
                CH_TAB => plain.push('\t' as u16),
                CH_LINE_BREAK => plain.push('\n' as u16),
                _ => {}
            }
            i += control_unit_width(u);
        } else {
            plain.push(u);
            i += 1;
        }
    }
    String::from_utf16(&plain).map_err(|_| {
        HwpError::Encoding("Unpaired surrogate in paragraph text".to_string())
    })
}

/// Slice wire text at character-shape change positions, returning the plain
/// text of each slice. Positions are unit offsets into the wire text, must
/// include 0 and be strictly increasing; out-of-range positions clamp to
/// the end.
pub fn slice_runs(units: &[u16], positions: &[u32]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(positions.len());
    for (i, &start) in positions.iter().enumerate() {
        let start = (start as usize).min(units.len());
        let end = positions
            .get(i + 1)
            .map(|&p| (p as usize).min(units.len()))
            .unwrap_or(units.len());
        out.push(wire_units_to_plain(&units[start..end.max(start)])?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        let units: Vec<u16> = "안녕 HWP".encode_utf16().collect();
        assert_eq!(wire_units_to_plain(&units).unwrap(), "안녕 HWP");
    }

    #[test]
    fn extended_control_is_skipped_whole() {
        // Object anchor: control char + 'lbt '+reserved + control char = 8 units.
        let mut units = vec![CH_OBJECT_ANCHOR, 0x6C20, 0x7462, 0, 0, 0, 0, CH_OBJECT_ANCHOR];
        units.extend("표".encode_utf16());
        assert_eq!(wire_units_to_plain(&units).unwrap(), "표");
    }

    #[test]
    fn tab_occupies_eight_units_but_yields_one_char() {
        let mut units = vec![CH_TAB, 0, 0, 0, 0, 0, 0, CH_TAB];
        units.extend("a".encode_utf16());
        assert_eq!(wire_units_to_plain(&units).unwrap(), "\ta");
    }

    #[test]
    fn para_break_is_dropped() {
        let mut units: Vec<u16> = "끝".encode_utf16().collect();
        units.push(CH_PARA_BREAK);
        assert_eq!(wire_units_to_plain(&units).unwrap(), "끝");
    }

    #[test]
    fn run_slicing() {
        let units: Vec<u16> = "Hello World".encode_utf16().collect();
        let runs = slice_runs(&units, &[0, 5]).unwrap();
        assert_eq!(runs, vec!["Hello".to_string(), " World".to_string()]);
    }
}
