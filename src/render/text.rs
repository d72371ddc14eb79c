use std::borrow::Cow;

pub const ELLIPSIS: char = '…';

/// Width estimate used for every label: fixed advance per character.
pub fn estimated_width(text: &str, char_width_px: f32) -> f32 {
    text.chars().count() as f32 * char_width_px
}

/// Ellipsizes `text` so its estimated width fits `max_width_px`. Display only;
/// callers keep the full name.
pub fn truncate_label(text: &str, max_width_px: f32, char_width_px: f32) -> Cow<'_, str> {
    let max_chars = if char_width_px > 0.0 && max_width_px > 0.0 {
        fitting_chars(max_width_px, char_width_px)
    } else {
        0
    };

    if text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }
    if max_chars == 0 {
        return Cow::Owned(String::new());
    }

    let mut truncated = text.chars().take(max_chars - 1).collect::<String>();
    truncated.push(ELLIPSIS);
    Cow::Owned(truncated)
}

/// Largest `n` with `n * char_width_px <= max_width_px`, measured the same
/// way `estimated_width` measures. The division alone can be off by one.
fn fitting_chars(max_width_px: f32, char_width_px: f32) -> usize {
    let fits = |count: usize| count as f32 * char_width_px <= max_width_px;
    let mut count = (max_width_px / char_width_px).floor() as usize;
    while count > 0 && !fits(count) {
        count -= 1;
    }
    while count < usize::MAX && fits(count + 1) {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::{ELLIPSIS, estimated_width, truncate_label};

    #[test]
    fn short_label_is_returned_unchanged() {
        let label = truncate_label("zone1", 100.0, 7.0);
        assert!(matches!(label, Cow::Borrowed("zone1")));
    }

    #[test]
    fn long_label_fits_budget_and_ends_with_ellipsis() {
        let label = truncate_label("observer-hangzhou-primary-01", 70.0, 7.0);
        assert_eq!(label.chars().count(), 10);
        assert!(label.ends_with(ELLIPSIS));
        assert!(estimated_width(&label, 7.0) <= 70.0);
    }

    #[test]
    fn every_budget_is_respected() {
        let text = "集群-cluster-with-a-long-name";
        for budget in 0..=250 {
            let budget = budget as f32;
            let label = truncate_label(text, budget, 7.5);
            assert!(
                estimated_width(&label, 7.5) <= budget,
                "budget {budget} produced `{label}`"
            );
        }
    }

    #[test]
    fn fractional_budgets_and_widths_are_respected() {
        let text = "zone-with-a-rather-long-name-for-display-purposes-and-more";
        for budget_tenths in 0..=2000 {
            let budget = budget_tenths as f32 / 10.0;
            for width_tenths in [1, 3, 7, 11, 33, 75, 125, 400] {
                let char_width = width_tenths as f32 / 10.0;
                let label = truncate_label(text, budget, char_width);
                assert!(
                    estimated_width(&label, char_width) <= budget,
                    "budget {budget} with width {char_width} produced `{label}`"
                );
            }
        }
        let label = truncate_label(text, 13.5, 0.3);
        assert!(estimated_width(&label, 0.3) <= 13.5);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        assert_eq!(truncate_label("abcd", 28.0, 7.0), "abcd");
        assert_eq!(truncate_label("abcde", 28.0, 7.0), "abc…");
    }
}
