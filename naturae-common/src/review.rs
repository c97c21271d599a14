//! Rating-based review scheduling
//!
//! A review updates the seen/correct counters of a card and pushes its
//! next review time out according to the rating:
//!
//! | rating | correct | interval                                  |
//! |--------|---------|-------------------------------------------|
//! | again  | no      | 1 minute                                  |
//! | hard   | yes     | 1 day                                     |
//! | good   | yes     | 2^(n-1) days, n = times correct, max 64   |
//! | easy   | yes     | twice the good interval, max 128          |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const MAX_GOOD_DAYS: i64 = 64;
const MAX_EASY_DAYS: i64 = 128;

/// Self-assessed answer quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "again" => Some(Rating::Again),
            "hard" => Some(Rating::Hard),
            "good" => Some(Rating::Good),
            "easy" => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn is_correct(&self) -> bool {
        !matches!(self, Rating::Again)
    }
}

/// Interval until the next review
///
/// `times_correct` is the counter after this review has been applied.
pub fn interval(times_correct: i64, rating: Rating) -> Duration {
    match rating {
        Rating::Again => Duration::minutes(1),
        Rating::Hard => Duration::days(1),
        Rating::Good => Duration::days(good_days(times_correct)),
        Rating::Easy => Duration::days((good_days(times_correct) * 2).min(MAX_EASY_DAYS)),
    }
}

fn good_days(times_correct: i64) -> i64 {
    let exponent = (times_correct.max(1) - 1).min(6) as u32;
    2_i64.pow(exponent).min(MAX_GOOD_DAYS)
}

/// Next review time for a review made at `now`
pub fn schedule(times_correct: i64, rating: Rating, now: DateTime<Utc>) -> DateTime<Utc> {
    now + interval(times_correct, rating)
}

/// Counters after applying a review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub times_seen: i64,
    pub times_correct: i64,
    pub next_review: DateTime<Utc>,
}

/// Apply a rating to the previous counters
pub fn apply(times_seen: i64, times_correct: i64, rating: Rating, now: DateTime<Utc>) -> ReviewOutcome {
    let times_correct = if rating.is_correct() {
        times_correct + 1
    } else {
        times_correct
    };

    ReviewOutcome {
        times_seen: times_seen + 1,
        times_correct,
        next_review: schedule(times_correct, rating, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_again_is_incorrect_and_short() {
        let outcome = apply(3, 2, Rating::Again, now());
        assert_eq!(outcome.times_seen, 4);
        assert_eq!(outcome.times_correct, 2);
        assert_eq!(outcome.next_review, now() + Duration::minutes(1));
    }

    #[test]
    fn test_good_interval_doubles() {
        assert_eq!(interval(1, Rating::Good), Duration::days(1));
        assert_eq!(interval(2, Rating::Good), Duration::days(2));
        assert_eq!(interval(4, Rating::Good), Duration::days(8));
        assert_eq!(interval(50, Rating::Good), Duration::days(64));
    }

    #[test]
    fn test_easy_is_twice_good_and_capped() {
        assert_eq!(interval(3, Rating::Easy), Duration::days(8));
        assert_eq!(interval(100, Rating::Easy), Duration::days(128));
    }

    #[test]
    fn test_first_good_review() {
        let outcome = apply(0, 0, Rating::Good, now());
        assert_eq!(outcome.times_seen, 1);
        assert_eq!(outcome.times_correct, 1);
        assert_eq!(outcome.next_review, now() + Duration::days(1));
    }

    #[test]
    fn test_hard_counts_as_correct() {
        let outcome = apply(1, 1, Rating::Hard, now());
        assert_eq!(outcome.times_correct, 2);
        assert_eq!(outcome.next_review, now() + Duration::days(1));
    }

    #[test]
    fn test_rating_parse() {
        assert_eq!(Rating::parse("easy"), Some(Rating::Easy));
        assert_eq!(Rating::parse("EASY"), None);
    }
}
