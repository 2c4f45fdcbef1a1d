pub struct StatsHelper;

impl StatsHelper {
    /// Mean over finite values; NaN when there are none.
    pub fn mean(samples: &[f64]) -> f64 {
        let (sum, count) = samples
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
        if count == 0 {
            return f64::NAN;
        }
        sum / count as f64
    }

    /// `(min, max)` over finite values, or `None` for an empty/all-NaN input.
    pub fn range(samples: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
        samples
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Rounds to `points` decimals; negative zero collapses to zero.
    pub fn round_to(value: f64, points: u32) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let factor = 10f64.powi(points as i32);
        let rounded = (value * factor).round() / factor;
        if rounded == 0.0 {
            0.0
        } else {
            rounded
        }
    }

    /// Renders a rounded value using the shortest representation that round-trips.
    pub fn format_value(value: f64, points: u32) -> String {
        format!("{}", Self::round_to(value, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_skips_nan() {
        assert_eq!(StatsHelper::mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(StatsHelper::mean(&[]).is_nan());
    }

    #[test]
    fn range_handles_empty_input() {
        assert_eq!(StatsHelper::range(Vec::new()), None);
        assert_eq!(StatsHelper::range(vec![3.0, -1.0, 2.0]), Some((-1.0, 3.0)));
    }

    #[test]
    fn format_value_limits_decimals() {
        assert_eq!(StatsHelper::format_value(0.123456, 2), "0.12");
        assert_eq!(StatsHelper::format_value(2.0, 2), "2");
        assert_eq!(StatsHelper::format_value(-0.001, 2), "0");
        assert_eq!(StatsHelper::format_value(1.98765, 0), "2");
        assert_eq!(StatsHelper::format_value(-3.14159, 4), "-3.1416");
    }
}
