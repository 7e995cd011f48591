/// Highest license level a pilot can reach.
pub const MAX_LICENSE_LEVEL: i32 = 12;

/// Returns how many segments a pilot's license clock has at the given level.
///
/// Levels 1-5 use 3 segments, 6-9 use 4, and 10-12 use 5. Anything else,
/// including level 0 and out-of-range values, falls back to 3.
#[must_use]
pub const fn get_ll_clock_segments(license_level: i32) -> i32 {
    match license_level {
        1..=5 => 3,
        6..=9 => 4,
        10..=12 => 5,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(get_ll_clock_segments(0), 3);
        assert_eq!(get_ll_clock_segments(1), 3);
        assert_eq!(get_ll_clock_segments(5), 3);
        assert_eq!(get_ll_clock_segments(6), 4);
        assert_eq!(get_ll_clock_segments(9), 4);
        assert_eq!(get_ll_clock_segments(10), 5);
        assert_eq!(get_ll_clock_segments(12), 5);
        assert_eq!(get_ll_clock_segments(13), 3);
    }

    #[test]
    fn test_out_of_range_defaults() {
        assert_eq!(get_ll_clock_segments(-5), 3);
        assert_eq!(get_ll_clock_segments(i32::MIN), 3);
        assert_eq!(get_ll_clock_segments(i32::MAX), 3);
    }

    #[test]
    fn test_every_valid_level() {
        let segments: Vec<i32> = (0..=MAX_LICENSE_LEVEL).map(get_ll_clock_segments).collect();
        assert_eq!(segments, vec![3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5]);
    }
}
