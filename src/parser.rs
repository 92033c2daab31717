//! Navigation cue parsing
//!
//! Extracts direction, distance, maneuver, and an ETA estimate from
//! free-form navigation notification text. Special cases (roundabouts with
//! exit numbers, destination arrival) are checked before the generic
//! direction phrase table.

use regex::Regex;

use crate::config::NavigationKeywords;
use crate::error::RelayError;
use crate::keywords::{
    DESTINATION_KEYWORDS, DIRECTION_PHRASES, MANEUVER_KEYWORDS, NAVIGATION_HINT_KEYWORDS,
    ROUNDABOUT_KEYWORDS,
};
use crate::transformer::distance_to_meters;
use crate::types::{Direction, NavigationEvent};

/// Parser for navigation notification text
pub struct NavigationParser {
    directions: Vec<(Direction, Vec<String>)>,
    destination: Vec<String>,
    roundabout: Vec<String>,
    maneuvers: Vec<String>,
    hints: Vec<String>,
    distance_re: Regex,
    exit_re: Regex,
    strip_leading_in_re: Regex,
    strip_distance_re: Regex,
}

impl NavigationParser {
    /// Parser over the built-in phrase tables
    pub fn new() -> Result<Self, RelayError> {
        Self::with_keywords(&NavigationKeywords::default())
    }

    /// Parser with configured phrases merged on top of the built-ins.
    /// Extras are appended, so the specificity order of the built-in
    /// direction table is preserved.
    pub fn with_keywords(extra: &NavigationKeywords) -> Result<Self, RelayError> {
        let directions = DIRECTION_PHRASES
            .iter()
            .map(|(direction, phrases)| {
                let mut list: Vec<String> = phrases.iter().map(|p| p.to_string()).collect();
                if let Some(more) = extra.directions.get(direction) {
                    list.extend(more.iter().map(|p| p.to_lowercase()));
                }
                (*direction, list)
            })
            .collect();

        let unit = r"(m|meters?|km|kilometers?|mi|miles?|ft|feet|foot)";
        Ok(NavigationParser {
            directions,
            destination: merge(DESTINATION_KEYWORDS, &extra.destination),
            roundabout: merge(ROUNDABOUT_KEYWORDS, &extra.roundabout),
            maneuvers: merge(MANEUVER_KEYWORDS, &extra.maneuvers),
            hints: merge(NAVIGATION_HINT_KEYWORDS, &extra.hints),
            distance_re: Regex::new(&format!(r"(?i)\b(\d+(?:\.\d+)?)\s*{unit}\b"))?,
            exit_re: Regex::new(r"(\d+)(?:st|nd|rd|th)\s+exit")?,
            strip_leading_in_re: Regex::new(&format!(r"(?i)\bin\s+\d+(?:\.\d+)?\s*{unit}\b"))?,
            strip_distance_re: Regex::new(&format!(r"(?i)\b\d+(?:\.\d+)?\s*{unit}\b"))?,
        })
    }

    /// Parse a navigation cue from notification text.
    ///
    /// Returns `None` when neither a direction nor a distance is present.
    pub fn parse(&self, text: &str) -> Option<NavigationEvent> {
        if text.trim().is_empty() {
            return None;
        }

        let lower = text.to_lowercase();

        let special = self
            .detect_roundabout(&lower)
            .or_else(|| self.detect_destination(&lower));

        let distance = self.extract_distance(text);

        let (direction, maneuver) = match special {
            Some((direction, maneuver)) => (Some(direction), maneuver),
            None => {
                let direction = self.extract_direction(&lower);
                let maneuver = self
                    .extract_maneuver(&lower)
                    .unwrap_or_else(|| self.clean_maneuver_text(text.trim()));
                (direction, maneuver)
            }
        };

        if direction.is_none() && distance.is_none() {
            return None;
        }

        let direction = direction.unwrap_or(Direction::Unknown);
        let eta = estimate_eta(distance.as_deref().unwrap_or("0m"), direction);

        Some(NavigationEvent {
            direction,
            distance,
            maneuver,
            eta: Some(eta),
        })
    }

    /// Quick check whether text plausibly carries a navigation cue at all
    pub fn is_navigation_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.hints.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Roundabout entry with the exit number mapped to a lane direction:
    /// 1st exit leaves left, 2nd continues through, 3rd and later leave right
    fn detect_roundabout(&self, lower: &str) -> Option<(Direction, String)> {
        if !self.roundabout.iter().any(|k| lower.contains(k.as_str())) {
            return None;
        }

        let exit_num = self
            .exit_re
            .captures(lower)
            .and_then(|caps| caps[1].parse::<u32>().ok());

        Some(match exit_num {
            Some(1) => (Direction::RoundaboutLeft, "1st exit".to_string()),
            Some(2) => (Direction::RoundaboutStraight, "2nd exit".to_string()),
            Some(n) if n >= 3 => (Direction::RoundaboutRight, format!("{} exit", ordinal(n))),
            _ => (Direction::RoundaboutStraight, "roundabout".to_string()),
        })
    }

    /// First distance mention, normalized to a short unit suffix ("200m",
    /// "1.2km"). Word units collapse to their abbreviation.
    fn extract_distance(&self, text: &str) -> Option<String> {
        let caps = self.distance_re.captures(text)?;
        let value = &caps[1];
        let unit = match caps[2].to_lowercase().as_str() {
            "m" | "meter" | "meters" => "m",
            "km" | "kilometer" | "kilometers" => "km",
            "mi" | "mile" | "miles" => "mi",
            "ft" | "feet" | "foot" => "ft",
            _ => return None,
        };
        Some(format!("{value}{unit}"))
    }

    /// Strip distance fragments so the maneuver reads as a street-level
    /// instruction ("Turn left onto Main Street")
    fn clean_maneuver_text(&self, text: &str) -> String {
        let cleaned = self.strip_leading_in_re.replace_all(text, "");
        let cleaned = self.strip_distance_re.replace_all(&cleaned, "");
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn extract_direction(&self, lower: &str) -> Option<Direction> {
        for (direction, phrases) in &self.directions {
            if phrases.iter().any(|p| lower.contains(p.as_str())) {
                return Some(*direction);
            }
        }
        None
    }

    fn extract_maneuver(&self, lower: &str) -> Option<String> {
        self.maneuvers
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(|k| {
                let mut chars = k.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
    }

    fn detect_destination(&self, lower: &str) -> Option<(Direction, String)> {
        if self.destination.iter().any(|k| lower.contains(k.as_str())) {
            Some((Direction::DestinationReached, "Destination reached".to_string()))
        } else {
            None
        }
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, x) if x != 11 => "st",
        (2, x) if x != 12 => "nd",
        (3, x) if x != 13 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn merge(builtin: &[&str], extra: &[String]) -> Vec<String> {
    builtin
        .iter()
        .map(|k| k.to_string())
        .chain(extra.iter().map(|k| k.to_lowercase()))
        .collect()
}

/// Assumed travel speed in km/h for the upcoming maneuver
fn assumed_speed_kmh(direction: Direction) -> f64 {
    match direction {
        Direction::SharpLeft | Direction::SharpRight => 20.0,
        Direction::UTurn => 15.0,
        Direction::RoundaboutLeft | Direction::RoundaboutRight | Direction::RoundaboutStraight => {
            25.0
        }
        Direction::MergeLeft | Direction::MergeRight => 35.0,
        Direction::KeepLeft | Direction::KeepRight => 40.0,
        Direction::DestinationReached => 0.0,
        Direction::Left
        | Direction::Right
        | Direction::Straight
        | Direction::SlightLeft
        | Direction::SlightRight
        | Direction::WaypointReached
        | Direction::Unknown => 30.0,
    }
}

/// Estimate time to the maneuver from a distance string and maneuver type
pub fn estimate_eta(distance: &str, direction: Direction) -> String {
    let speed_kmh = assumed_speed_kmh(direction);
    if speed_kmh <= 0.0 {
        return "Arrived".to_string();
    }

    let meters = distance_to_meters(distance) as f64;
    let speed_ms = speed_kmh / 3.6;
    // Round to whole seconds first; exact-minute travel times otherwise land
    // a hair under the boundary in f64 and truncate a minute short
    let secs = (meters / speed_ms).round() as u64;
    let minutes = secs / 60;

    if minutes < 1 {
        "< 1 min".to_string()
    } else if minutes < 60 {
        format!("{minutes} min")
    } else {
        let hours = minutes / 60;
        let rem = minutes % 60;
        if rem == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {rem}m")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_parser() -> NavigationParser {
        NavigationParser::new().expect("parser")
    }

    #[test]
    fn test_parse_turn_with_distance() {
        let parser = make_parser();
        let event = parser
            .parse("Turn left in 200m onto Main Street")
            .expect("event");
        assert_eq!(event.direction, Direction::Left);
        assert_eq!(event.distance.as_deref(), Some("200m"));
        assert_eq!(event.maneuver, "Turn left onto Main Street");
        assert_eq!(event.eta.as_deref(), Some("< 1 min"));
    }

    #[test]
    fn test_sharp_left_wins_over_plain_left() {
        let parser = make_parser();
        let event = parser.parse("Turn sharp left in 50m").expect("event");
        assert_eq!(event.direction, Direction::SharpLeft);
    }

    #[test]
    fn test_distance_unit_normalization() {
        let parser = make_parser();
        let event = parser.parse("Continue for 1.2 kilometers").expect("event");
        assert_eq!(event.direction, Direction::Straight);
        assert_eq!(event.distance.as_deref(), Some("1.2km"));

        let event = parser.parse("Turn right in 500 feet").expect("event");
        assert_eq!(event.distance.as_deref(), Some("500ft"));
    }

    #[test]
    fn test_roundabout_exit_mapping() {
        let parser = make_parser();

        let event = parser
            .parse("At the roundabout, take the 1st exit")
            .expect("event");
        assert_eq!(event.direction, Direction::RoundaboutLeft);
        assert_eq!(event.maneuver, "1st exit");

        let event = parser
            .parse("At the roundabout, take the 2nd exit")
            .expect("event");
        assert_eq!(event.direction, Direction::RoundaboutStraight);
        assert_eq!(event.maneuver, "2nd exit");

        let event = parser
            .parse("At the roundabout, take the 5th exit")
            .expect("event");
        assert_eq!(event.direction, Direction::RoundaboutRight);
        assert_eq!(event.maneuver, "5th exit");
    }

    #[test]
    fn test_roundabout_ordinal_suffixes() {
        let parser = make_parser();

        let event = parser
            .parse("At the roundabout, take the 21st exit")
            .expect("event");
        assert_eq!(event.maneuver, "21st exit");

        let event = parser
            .parse("At the roundabout, take the 22nd exit")
            .expect("event");
        assert_eq!(event.maneuver, "22nd exit");

        let event = parser
            .parse("At the roundabout, take the 23rd exit")
            .expect("event");
        assert_eq!(event.maneuver, "23rd exit");

        let event = parser
            .parse("At the roundabout, take the 11th exit")
            .expect("event");
        assert_eq!(event.maneuver, "11th exit");
    }

    #[test]
    fn test_roundabout_without_exit_number() {
        let parser = make_parser();
        let event = parser.parse("Enter the roundabout ahead").expect("event");
        assert_eq!(event.direction, Direction::RoundaboutStraight);
        assert_eq!(event.maneuver, "roundabout");
    }

    #[test]
    fn test_destination_reached() {
        let parser = make_parser();
        let event = parser.parse("You have arrived at your destination").expect("event");
        assert_eq!(event.direction, Direction::DestinationReached);
        assert_eq!(event.maneuver, "Destination reached");
        assert_eq!(event.eta.as_deref(), Some("Arrived"));
    }

    #[test]
    fn test_distance_only_yields_unknown_direction() {
        let parser = make_parser();
        let event = parser.parse("proceed 300m").expect("event");
        assert_eq!(event.direction, Direction::Unknown);
        assert_eq!(event.distance.as_deref(), Some("300m"));
    }

    #[test]
    fn test_no_cue_returns_none() {
        let parser = make_parser();
        assert_eq!(parser.parse(""), None);
        assert_eq!(parser.parse("Battery charged to 80%"), None);
    }

    #[test]
    fn test_maneuver_keyword_promoted() {
        let parser = make_parser();
        let event = parser
            .parse("Take the exit right toward the highway in 2km")
            .expect("event");
        assert_eq!(event.maneuver, "Exit");
    }

    #[test]
    fn test_eta_buckets() {
        // 200m at default 30 km/h is 24 s
        assert_eq!(estimate_eta("200m", Direction::Left), "< 1 min");
        // 1.2km at 30 km/h is 144 s
        assert_eq!(estimate_eta("1.2km", Direction::Left), "2 min");
        // 60km at 40 km/h is 90 min
        assert_eq!(estimate_eta("60km", Direction::KeepLeft), "1h 30m");
        // 40km at 40 km/h is exactly 1 h
        assert_eq!(estimate_eta("40km", Direction::KeepRight), "1h");
        assert_eq!(estimate_eta("5km", Direction::DestinationReached), "Arrived");
    }

    #[test]
    fn test_eta_speed_varies_by_maneuver() {
        // 1km: exactly 240 s at 15 km/h, which must not truncate to 3 min
        assert_eq!(estimate_eta("1km", Direction::UTurn), "4 min");
        assert_eq!(estimate_eta("1km", Direction::KeepLeft), "1 min");
    }

    #[test]
    fn test_configured_keywords_extend_builtins() {
        let mut extra = NavigationKeywords::default();
        extra
            .directions
            .insert(Direction::Left, vec!["hang a left".to_string()]);
        extra.destination.push("you are here".to_string());
        let parser = NavigationParser::with_keywords(&extra).expect("parser");

        let event = parser.parse("Hang a left at the bakery").expect("event");
        assert_eq!(event.direction, Direction::Left);

        let event = parser.parse("You are here").expect("event");
        assert_eq!(event.direction, Direction::DestinationReached);

        // Built-ins still apply
        let event = parser.parse("Turn sharp left in 50m").expect("event");
        assert_eq!(event.direction, Direction::SharpLeft);
    }

    #[test]
    fn test_is_navigation_text() {
        let parser = make_parser();
        assert!(parser.is_navigation_text("Turn left onto Elm Street"));
        assert!(!parser.is_navigation_text("2 new photos from Alice"));
    }
}
