use chrono::{DateTime, TimeZone, Utc};

pub const MAX_LEVEL: u32 = 10;

/// Points required to reach each level above 1, lowest first.
const LEVEL_THRESHOLDS: [u32; 9] = [100, 200, 300, 400, 500, 600, 700, 800, 900];

/// Level for a cumulative point total. The only place a level is derived;
/// every write of `points` must write this alongside it.
pub fn level_for_points(points: u32) -> u32 {
    let crossed = LEVEL_THRESHOLDS.iter().take_while(|&&t| points >= t).count() as u32;
    1 + crossed
}

/// Points still missing before the next level, or `None` at the cap.
pub fn points_to_next_level(points: u32) -> Option<u32> {
    let level = level_for_points(points);
    if level >= MAX_LEVEL {
        return None;
    }
    Some(LEVEL_THRESHOLDS[(level - 1) as usize] - points)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: u32,
    pub last_completed_at: DateTime<Utc>,
}

/// Streak after a lesson completion, with calendar days taken in UTC.
pub fn update_streak(
    previous: u32,
    last_completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StreakUpdate {
    update_streak_in(previous, last_completed_at, now, &Utc)
}

/// Streak after a lesson completion, counting midnights in `tz`.
///
/// Same day keeps the streak, the next day extends it, anything later
/// starts over at 1. A previous completion stamped in the future (clock
/// skew) counts as the same day.
pub fn update_streak_in<Tz: TimeZone>(
    previous: u32,
    last_completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> StreakUpdate {
    let streak = match last_completed_at {
        None => 1,
        Some(last) => {
            let last_day = last.with_timezone(tz).date_naive();
            let today = now.with_timezone(tz).date_naive();
            match (today - last_day).num_days() {
                d if d <= 0 => previous,
                1 => previous.saturating_add(1),
                _ => 1,
            }
        }
    };

    StreakUpdate {
        streak,
        last_completed_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};
    use proptest::prelude::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(250), 3);
        assert_eq!(level_for_points(899), 9);
        assert_eq!(level_for_points(900), 10);
        assert_eq!(level_for_points(10_000), 10);
        assert_eq!(level_for_points(u32::MAX), 10);
    }

    #[test]
    fn next_level_distance() {
        assert_eq!(points_to_next_level(0), Some(100));
        assert_eq!(points_to_next_level(150), Some(50));
        assert_eq!(points_to_next_level(899), Some(1));
        assert_eq!(points_to_next_level(900), None);
    }

    proptest! {
        #[test]
        fn level_is_monotonic_and_bounded(a in 0u32..20_000, b in 0u32..20_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for_points(lo) <= level_for_points(hi));
            prop_assert!((1..=MAX_LEVEL).contains(&level_for_points(a)));
        }
    }

    #[test]
    fn first_completion_starts_streak() {
        let now = at("2024-03-10T10:00:00Z");
        let update = update_streak(5, None, now);
        assert_eq!(update, StreakUpdate { streak: 1, last_completed_at: now });
    }

    #[test]
    fn same_calendar_day_keeps_streak() {
        let now = at("2024-03-10T23:00:00Z");
        let update = update_streak(5, Some(now - Duration::hours(23)), now);
        assert_eq!(update.streak, 5);
        assert_eq!(update.last_completed_at, now);
    }

    #[test]
    fn next_calendar_day_extends_even_under_24_hours() {
        let now = at("2024-03-10T10:00:00Z");
        let update = update_streak(5, Some(now - Duration::hours(23)), now);
        assert_eq!(update.streak, 6);
    }

    #[test]
    fn missed_day_resets_streak() {
        let now = at("2024-03-10T10:00:00Z");
        let update = update_streak(5, Some(now - Duration::hours(49)), now);
        assert_eq!(update.streak, 1);
    }

    #[test]
    fn future_last_completion_counts_as_same_day() {
        let now = at("2024-03-10T10:00:00Z");
        let update = update_streak(3, Some(now + Duration::days(2)), now);
        assert_eq!(update.streak, 3);
    }

    #[test]
    fn day_boundary_follows_offset() {
        // 23:30 UTC and 00:30 UTC the next day are the same day at UTC-2.
        let tz = FixedOffset::west_opt(2 * 3600).unwrap();
        let last = at("2024-03-09T23:30:00Z");
        let now = at("2024-03-10T00:30:00Z");
        assert_eq!(update_streak_in(4, Some(last), now, &tz).streak, 4);
        assert_eq!(update_streak(4, Some(last), now).streak, 5);
    }
}
