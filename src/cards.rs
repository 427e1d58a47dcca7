use crate::types::Mode;

/// The "no idea / coffee" card. Valid in every mode, never counted.
pub const UNKNOWN: &str = "?";

/// Story-point cards.
pub const NORMAL_CARDS: [&str; 7] = ["1", "2", "3", "5", "8", "13", UNKNOWN];

/// An Hours-mode card: token, hour quantity and display label.
#[derive(Debug, Clone, Copy)]
pub struct HoursCard {
    pub token: &'static str,
    pub hours: f64,
    pub label: &'static str,
}

// "20" and "40" both map to 80 hours.
pub static HOURS_TABLE: [HoursCard; 10] = [
    HoursCard { token: "0", hours: 0.0, label: "0 - < 30min" },
    HoursCard { token: "0.5", hours: 0.5, label: "1/2 - 30min - 1h" },
    HoursCard { token: "1", hours: 1.0, label: "1 - 1h - 2h" },
    HoursCard { token: "2", hours: 2.0, label: "2 - 2h - 4h" },
    HoursCard { token: "3", hours: 8.0, label: "3 - 1 dia" },
    HoursCard { token: "5", hours: 16.0, label: "5 - 1 a 2 dias" },
    HoursCard { token: "8", hours: 32.0, label: "8 - 2 a 4 dias" },
    HoursCard { token: "13", hours: 64.0, label: "13 - 4 a 8 dias" },
    HoursCard { token: "20", hours: 80.0, label: "20 - > 8 dias" },
    HoursCard { token: "40", hours: 80.0, label: "40 - 1 sprint" },
];

fn hours_card(token: &str) -> Option<&'static HoursCard> {
    HOURS_TABLE.iter().find(|c| c.token == token)
}

/// Hour quantity for an Hours-mode token.
pub fn hours_for(token: &str) -> Option<f64> {
    hours_card(token).map(|c| c.hours)
}

/// Long display label for an Hours-mode token.
pub fn hours_label(token: &str) -> Option<&'static str> {
    hours_card(token).map(|c| c.label)
}

/// Card tokens offered in the given mode, in display order.
pub fn cards_for(mode: Mode) -> Vec<&'static str> {
    match mode {
        Mode::Normal => NORMAL_CARDS.to_vec(),
        Mode::Hours => HOURS_TABLE
            .iter()
            .map(|c| c.token)
            .chain(std::iter::once(UNKNOWN))
            .collect(),
    }
}

/// Whether `token` belongs to the card set of `mode`.
pub fn is_valid_card(mode: Mode, token: &str) -> bool {
    match mode {
        Mode::Normal => NORMAL_CARDS.contains(&token),
        Mode::Hours => token == UNKNOWN || hours_card(token).is_some(),
    }
}

/// Short face printed on a card: the label text before `" - "` in Hours mode.
pub fn card_face(mode: Mode, token: &str) -> String {
    match (mode, hours_label(token)) {
        (Mode::Hours, Some(label)) => label
            .split(" - ")
            .next()
            .unwrap_or(token)
            .to_string(),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_sets() {
        assert_eq!(cards_for(Mode::Normal), vec!["1", "2", "3", "5", "8", "13", "?"]);
        assert_eq!(
            cards_for(Mode::Hours),
            vec!["0", "0.5", "1", "2", "3", "5", "8", "13", "20", "40", "?"]
        );
    }

    #[test]
    fn test_validity_depends_on_mode() {
        assert!(is_valid_card(Mode::Normal, "13"));
        assert!(!is_valid_card(Mode::Normal, "0.5"));
        assert!(!is_valid_card(Mode::Normal, "40"));
        assert!(is_valid_card(Mode::Hours, "0.5"));
        assert!(is_valid_card(Mode::Hours, "40"));
        assert!(is_valid_card(Mode::Hours, "?"));
        assert!(is_valid_card(Mode::Normal, "?"));
        assert!(!is_valid_card(Mode::Hours, "21"));
        assert!(!is_valid_card(Mode::Normal, ""));
    }

    #[test]
    fn test_hours_collision_is_literal() {
        assert_eq!(hours_for("20"), Some(80.0));
        assert_eq!(hours_for("40"), Some(80.0));
        assert_eq!(hours_for("3"), Some(8.0));
        assert_eq!(hours_for("?"), None);
    }

    #[test]
    fn test_card_face() {
        assert_eq!(card_face(Mode::Hours, "0.5"), "1/2");
        assert_eq!(card_face(Mode::Hours, "40"), "40");
        assert_eq!(card_face(Mode::Hours, "?"), "?");
        assert_eq!(card_face(Mode::Normal, "8"), "8");
    }
}
