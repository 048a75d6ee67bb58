use crate::sheet::Cell;

/// Parses a quantity cell. Never fails: anything unusable is 0.
///
/// Numbers must be finite, non-negative and integral. Text may only hold
/// digits and whitespace; inner whitespace is read as a thousands separator.
pub fn parse_qty(cell: &Cell) -> u32 {
    match cell {
        Cell::Empty => 0,
        Cell::Number(n) => {
            if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 {
                *n as u32
            } else {
                0
            }
        }
        Cell::Text(s) => parse_qty_text(s),
    }
}

fn parse_qty_text(s: &str) -> u32 {
    let s = s.trim();
    if !s.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return 0;
    }
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u32>().unwrap_or(0)
}
