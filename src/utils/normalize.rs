/// Maps a raw decision-function score onto [0, 1], 1.0 being most anomalous.
///
/// Raw scores are centred near zero with a useful range of about
/// [-0.5, 0.5]; anything beyond that saturates.
pub fn normalize_anomaly(raw: f64) -> f64 {
    (1.0 - (raw + 0.5)).clamp(0.0, 1.0)
}

/// Rounds half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors() {
        assert_eq!(normalize_anomaly(-0.5), 1.0);
        assert_eq!(normalize_anomaly(0.5), 0.0);
        assert_eq!(normalize_anomaly(0.0), 0.5);
    }

    #[test]
    fn clamps_out_of_range_scores() {
        assert_eq!(normalize_anomaly(-3.0), 1.0);
        assert_eq!(normalize_anomaly(7.0), 0.0);
        assert_eq!(normalize_anomaly(f64::NEG_INFINITY), 1.0);
    }

    #[test]
    fn monotonically_decreasing() {
        let mut prev = f64::INFINITY;
        for i in -100..=100 {
            let s = normalize_anomaly(f64::from(i) / 100.0);
            assert!(s <= prev);
            assert!((0.0..=1.0).contains(&s));
            prev = s;
        }
    }

    #[test]
    fn rounds_to_four_places() {
        assert_eq!(round_to(0.123_456, 4), 0.1235);
        assert_eq!(round_to(0.999_96, 4), 1.0);
        assert_eq!(round_to(0.0, 4), 0.0);
    }
}
