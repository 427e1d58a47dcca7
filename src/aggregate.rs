use crate::cards::{self, UNKNOWN};
use crate::types::{Mode, Roster};

/// Returned when no counted vote is present.
pub const NOT_AVAILABLE: &str = "N/A";

/// Round half up to one fractional digit.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute the display string of the average vote.
///
/// Unset votes and `?` are ignored. Normal mode yields the plain mean with one
/// decimal; Hours mode maps tokens through the hours table and formats the mean
/// as minutes, hours or eight-hour days depending on its magnitude.
pub fn average(players: &Roster, mode: Mode) -> String {
    let counted = players
        .values()
        .filter_map(|v| v.as_deref())
        .filter(|v| *v != UNKNOWN);

    let quantities: Vec<f64> = match mode {
        Mode::Normal => counted.filter_map(|v| v.parse::<f64>().ok()).collect(),
        Mode::Hours => counted.filter_map(cards::hours_for).collect(),
    };

    if quantities.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    let mean = quantities.iter().sum::<f64>() / quantities.len() as f64;

    match mode {
        Mode::Normal => format!("{:.1}", round1(mean)),
        Mode::Hours => format_hours(mean),
    }
}

fn format_hours(mean: f64) -> String {
    if mean < 1.0 {
        format!("{}min", (mean * 60.0).round() as i64)
    } else if mean < 8.0 {
        format!("{:.1}h", round1(mean))
    } else {
        format!("{:.1} dias", round1(mean / 8.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(votes: &[(&str, Option<&str>)]) -> Roster {
        votes
            .iter()
            .map(|(name, vote)| (name.to_string(), vote.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_normal_mean() {
        let players = roster(&[("A", Some("5")), ("B", Some("8"))]);
        assert_eq!(average(&players, Mode::Normal), "6.5");
    }

    #[test]
    fn test_normal_rounds_half_up() {
        // (1 + 1 + 1 + 2) / 4 = 1.25
        let players = roster(&[
            ("A", Some("1")),
            ("B", Some("1")),
            ("C", Some("1")),
            ("D", Some("2")),
        ]);
        assert_eq!(average(&players, Mode::Normal), "1.3");
    }

    #[test]
    fn test_hours_mean_in_hours() {
        let players = roster(&[("A", Some("0.5")), ("B", Some("1")), ("C", Some("3"))]);
        assert_eq!(average(&players, Mode::Hours), "3.2h");
    }

    #[test]
    fn test_hours_below_one_hour_in_minutes() {
        let players = roster(&[("A", Some("0")), ("B", Some("0.5"))]);
        assert_eq!(average(&players, Mode::Hours), "15min");
        let players = roster(&[("A", Some("0"))]);
        assert_eq!(average(&players, Mode::Hours), "0min");
    }

    #[test]
    fn test_hours_in_days() {
        // 8h and 16h -> 12h -> 1.5 days
        let players = roster(&[("A", Some("3")), ("B", Some("5"))]);
        assert_eq!(average(&players, Mode::Hours), "1.5 dias");
        let players = roster(&[("A", Some("3"))]);
        assert_eq!(average(&players, Mode::Hours), "1.0 dias");
        let players = roster(&[("A", Some("40")), ("B", Some("20"))]);
        assert_eq!(average(&players, Mode::Hours), "10.0 dias");
    }

    #[test]
    fn test_only_unknown_is_not_available() {
        let players = roster(&[("A", Some("?")), ("B", Some("?"))]);
        assert_eq!(average(&players, Mode::Normal), NOT_AVAILABLE);
        assert_eq!(average(&players, Mode::Hours), NOT_AVAILABLE);
    }

    #[test]
    fn test_unset_and_unknown_are_skipped() {
        let players = roster(&[("A", None), ("B", Some("?")), ("C", Some("3"))]);
        assert_eq!(average(&players, Mode::Normal), "3.0");
        assert_eq!(average(&Roster::new(), Mode::Normal), NOT_AVAILABLE);
    }
}
