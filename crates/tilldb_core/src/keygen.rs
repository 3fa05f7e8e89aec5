//! Record identifier generation.
//!
//! Every record id is a three-part string: a short table prefix, the
//! creation time in unix milliseconds rendered in base 36, and a random
//! component rendered as six base-36 digits. Examples:
//!
//! ```text
//! cust-m5ob3kqf-8dk20x
//! item-m5ob3kqg-01tz9c
//! ```
//!
//! Ids sort roughly by creation time within a table, stay readable in
//! exported JSON, and need no coordination between writers.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Width of the random id segment in base-36 digits.
const RANDOM_WIDTH: usize = 6;

/// Number of distinct random segments (36^6).
const RANDOM_SPACE: u64 = 36u64.pow(RANDOM_WIDTH as u32);

/// Generates a fresh record id with the given table prefix.
///
/// The result is `{prefix}-{timestamp}-{random}` where the timestamp is the
/// current unix time in milliseconds and both non-prefix segments are
/// lowercase base 36. Generation never fails; a clock reading before the
/// unix epoch produces a zero timestamp segment.
///
/// # Example
///
/// ```
/// let id = tilldb_core::keygen::generate_id("cust");
/// assert!(id.starts_with("cust-"));
/// ```
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    let random: u64 = rand::thread_rng().gen_range(0..RANDOM_SPACE);
    format!(
        "{prefix}-{}-{:0>width$}",
        to_base36(now_millis()),
        to_base36(random),
        width = RANDOM_WIDTH
    )
}

/// Returns the current unix time in milliseconds.
///
/// Clamps to zero if the system clock reads before the unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders `value` in lowercase base 36 with no padding.
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    digits.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn base36_renders_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36), "100");
        assert_eq!(to_base36(u64::from(u32::MAX)), "1z141z3");
    }

    #[test]
    fn id_has_prefix_timestamp_and_random_segments() {
        let id = generate_id("cust");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "cust");
        assert!(u64::from_str_radix(parts[1], 36).is_ok());
        assert_eq!(parts[2].len(), RANDOM_WIDTH);
        assert!(u64::from_str_radix(parts[2], 36).is_ok());
    }

    #[test]
    fn timestamp_segment_tracks_the_clock() {
        let before = now_millis();
        let id = generate_id("inv");
        let after = now_millis();
        let segment = id.split('-').nth(1).unwrap();
        let stamp = u64::from_str_radix(segment, 36).unwrap();
        assert!(stamp >= before);
        assert!(stamp <= after);
    }

    #[test]
    fn ids_do_not_collide_within_a_burst() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id("item")).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn different_prefixes_share_nothing_but_format() {
        let a = generate_id("cust");
        let b = generate_id("mstr");
        assert!(a.starts_with("cust-"));
        assert!(b.starts_with("mstr-"));
        assert_ne!(a, b);
    }

    #[test]
    fn random_segment_is_zero_padded() {
        // Width stays fixed even when the random value is small, so ids
        // generated in the same millisecond line up column for column.
        for _ in 0..200 {
            let id = generate_id("x");
            assert_eq!(id.split('-').nth(2).unwrap().len(), RANDOM_WIDTH);
        }
    }
}
