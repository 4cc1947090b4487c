use crate::scoring::percentage;

/// Split `width` cells between the correct and incorrect segments of the
/// results bar. A non-zero count always gets at least one cell when it fits.
pub fn ratio_widths(correct: usize, incorrect: usize, width: u16) -> (u16, u16) {
    let total = correct + incorrect;
    if total == 0 || width == 0 {
        return (0, 0);
    }

    let mut left = ((correct as f64 / total as f64) * width as f64).round() as u16;
    if correct > 0 && left == 0 {
        left = 1;
    }
    if incorrect > 0 && left == width && width > 1 {
        left = width - 1;
    }
    (left, width - left)
}

/// Legend entry for one segment, e.g. `Σωστές: 2 (67%)`.
pub fn legend_label(label: &str, value: usize, total: usize) -> String {
    format!("{label}: {value} ({}%)", percentage(value, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_widths_empty() {
        assert_eq!(ratio_widths(0, 0, 40), (0, 0));
        assert_eq!(ratio_widths(3, 1, 0), (0, 0));
    }

    #[test]
    fn test_ratio_widths_proportional() {
        assert_eq!(ratio_widths(1, 1, 40), (20, 20));
        assert_eq!(ratio_widths(3, 0, 40), (40, 0));
        assert_eq!(ratio_widths(0, 3, 40), (0, 40));
    }

    #[test]
    fn test_ratio_widths_keeps_small_segments_visible() {
        assert_eq!(ratio_widths(1, 99, 10), (1, 9));
        assert_eq!(ratio_widths(99, 1, 10), (9, 1));
    }

    #[test]
    fn test_legend_label() {
        assert_eq!(legend_label("Σωστές", 2, 3), "Σωστές: 2 (67%)");
        assert_eq!(legend_label("Λανθασμένες", 0, 0), "Λανθασμένες: 0 (0%)");
    }
}
