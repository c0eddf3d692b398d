//! Cell reference utilities shared between the package rewriters and the salvage writer

/// Parse a cell reference like "A1" into (row, col) as 0-based indices
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col = 0u32;
    let mut row_str = String::new();

    for ch in cell_ref.chars() {
        if ch.is_ascii_alphabetic() {
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        } else if ch.is_ascii_digit() {
            row_str.push(ch);
        }
    }

    if row_str.is_empty() {
        return None;
    }

    let row = row_str.parse::<u32>().ok()?;

    // Convert to 0-based
    Some((row.saturating_sub(1), col.saturating_sub(1)))
}

/// Convert a 0-based column index to its letter form ("A", "Z", "AA", ...)
pub fn column_letters(col: u32) -> String {
    let mut c = col + 1;
    let mut letters = String::new();
    while c > 0 {
        let m = (c - 1) % 26;
        letters.insert(0, (b'A' + m as u8) as char);
        c = (c - m) / 26;
    }
    letters
}

/// Format 0-based (row, col) as an "A1"-style reference
pub fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B2"), Some((1, 1)));
        assert_eq!(parse_cell_ref("Z26"), Some((25, 25)));
        assert_eq!(parse_cell_ref("AA1"), Some((0, 26)));
        assert_eq!(parse_cell_ref("AB10"), Some((9, 27)));
    }

    #[test]
    fn test_cell_ref_round_trip() {
        assert_eq!(cell_ref(0, 0), "A1");
        assert_eq!(cell_ref(9, 27), "AB10");
        assert_eq!(parse_cell_ref(&cell_ref(122, 701)), Some((122, 701)));
    }
}
