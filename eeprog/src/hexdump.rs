//! Canonical hex + ASCII dumps for diagnostics.
//!
//! ```text
//! 00000000  68 65 6c 6c 6f 00 01 02  03 04 05 06 07 08 09 0a  |hello...........|
//! ```

use std::fmt::Write as _;

/// Bytes shown per line.
const BYTES_PER_LINE: usize = 16;

/// Render `data` as a hex dump, one line per 16 bytes.
///
/// Returns an empty string for empty input.
pub fn dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(BYTES_PER_LINE) * 79);

    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:08x}  ", line * BYTES_PER_LINE);

        for i in 0..BYTES_PER_LINE {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                },
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }

        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| printable(b)));
        out.push_str("|\n");
    }

    out
}

fn printable(b: u8) -> char {
    if (0x20..=0x7E).contains(&b) {
        b as char
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_empty() {
        assert_eq!(dump(&[]), "");
    }

    #[test]
    fn test_dump_full_line() {
        let data: Vec<u8> = (0..16).collect();
        assert_eq!(
            dump(&data),
            "00000000  00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f  |................|\n"
        );
    }

    #[test]
    fn test_dump_partial_line_is_padded() {
        let out = dump(b"hello");
        assert_eq!(
            out,
            "00000000  68 65 6c 6c 6f                                    |hello|\n"
        );
    }

    #[test]
    fn test_dump_offsets_advance() {
        let out = dump(&[0xAA; 20]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  aa"));
        assert!(lines[1].starts_with("00000010  aa aa aa aa"));
    }
}
