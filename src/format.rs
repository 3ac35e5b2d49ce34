//! compact value formatting for grid cells.
//!
//! every function takes the width of the cell the text must fit in, and picks the most precise
//! rendition that fits.

/// binary unit suffixes, starting from kibibytes.
const UNITS: [char; 4] = ['K', 'M', 'G', 'T'];

/// a byte count, such as `"1.5G"` or `"812K"`. zero is `"."`, to keep idle values quiet.
pub fn bytes(bytes: u64, width: usize) -> String {
    if bytes == 0 {
        return ".".to_owned();
    }

    // a unit is kept until the value reaches 10000 of it, when there is room for four digits.
    let threshold = if width >= 5 { 10_000.0 } else { 1_000.0 };
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < threshold {
            break;
        }
        value /= 1024.0;
        unit = *next;
    }

    fitted(value, width, |precision| format!("{value:.precision$}{unit}"))
}

/// a byte rate, formatted as [`bytes`] per second.
pub fn bytes_rate(rate: f64, width: usize) -> String {
    bytes(rate.max(0.0).round() as u64, width)
}

/// an event rate, such as `"12.5"`, `"340"` or `"12.1k"`. a negligible rate is `"."`.
pub fn rate(rate: f64, width: usize) -> String {
    if rate < 0.05 {
        return ".".to_owned();
    }
    let (value, suffix) = match rate {
        r if r >= 1e9 => (r / 1e9, "G"),
        r if r >= 1e6 => (r / 1e6, "M"),
        r if r >= 1e4 => (r / 1e3, "k"),
        r => (r, ""),
    };
    fitted(value, width, |precision| format!("{value:.precision$}{suffix}"))
}

/// a percentage, such as `"42.5%"`. whole percentages are printed from 100 up.
pub fn percent(percent: f64, width: usize) -> String {
    let percent = percent.max(0.0);
    if percent >= 100.0 {
        return format!("{percent:.0}%");
    }
    fitted(percent, width, |precision| format!("{percent:.precision$}%"))
}

/// a temperature given in millidegrees, such as `"45.2C"`.
pub fn celsius(millicelsius: u64, width: usize) -> String {
    let degrees = millicelsius as f64 / 1000.0;
    fitted(degrees, width, |precision| format!("{degrees:.precision$}C"))
}

/// a power given in microwatts, such as `"48.5W"`.
pub fn watts(microwatts: u64, width: usize) -> String {
    let watts = microwatts as f64 / 1_000_000.0;
    fitted(watts, width, |precision| format!("{watts:.precision$}W"))
}

/// truncates `text` to at most `width` characters.
pub fn clip(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// renders with one decimal when that fits in `width`, and without otherwise.
fn fitted(value: f64, width: usize, render: impl Fn(usize) -> String) -> String {
    let precise = render(1);
    if precise.len() <= width && value < 1000.0 {
        precise
    } else {
        render(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes_is_a_dot() {
        assert_eq!(bytes(0, 9), ".");
    }

    #[test]
    fn bytes_pick_a_unit() {
        assert_eq!(bytes(512, 9), "0.5K");
        assert_eq!(bytes(1536 * 1024, 9), "1536K");
        assert_eq!(bytes(10_000 * 1024, 9), "9.8M");
        assert_eq!(bytes(3 * 1024 * 1024 * 1024, 9), "3072M");
        assert_eq!(bytes(16 * 1024 * 1024 * 1024 * 1024, 9), "16.0T");
    }

    #[test]
    fn narrow_cells_use_larger_units() {
        assert_eq!(bytes(1536 * 1024, 4), "1.5M");
        assert_eq!(bytes(2000 * 1024 * 1024, 4), "2.0G");
        assert_eq!(bytes(1536 * 1024, 5), "1536K");
    }

    #[test]
    fn rates() {
        assert_eq!(rate(0.0, 9), ".");
        assert_eq!(rate(2.5, 9), "2.5");
        assert_eq!(rate(4250.0, 9), "4250");
        assert_eq!(rate(125_000.0, 9), "125.0k");
        assert_eq!(rate(3_500_000.0, 5), "3.5M");
        assert_eq!(rate(3_700_000.0, 3), "4M");
    }

    #[test]
    fn percentages() {
        assert_eq!(percent(42.53, 9), "42.5%");
        assert_eq!(percent(100.0, 9), "100%");
        assert_eq!(percent(-3.0, 9), "0.0%");
        assert_eq!(percent(99.9, 4), "100%");
    }

    #[test]
    fn temperatures() {
        assert_eq!(celsius(45_300, 9), "45.3C");
        assert_eq!(celsius(105_000, 4), "105C");
    }

    #[test]
    fn power() {
        assert_eq!(watts(48_340_000, 9), "48.3W");
        assert_eq!(watts(203_000_000, 5), "203W");
    }

    #[test]
    fn clipping_counts_characters() {
        assert_eq!(clip("kworker/0:1", 7), "kworker");
        assert_eq!(clip("naïve", 3), "naï");
        assert_eq!(clip("sh", 7), "sh");
    }
}
