//! Wire payload encoding
//!
//! Converts parsed events into the compact JSON the display firmware
//! consumes. Distances are converted to integer meters, directions to the
//! firmware's short codes. Payloads over the profile's byte limit are
//! rejected outright; the firmware cannot handle partial JSON, so there is
//! no truncation path.

use serde::Serialize;

use crate::config::FormatProfile;
use crate::error::RelayError;
use crate::types::{CallState, Direction, EventClass, NavigationEvent, PhoneCallEvent, WirePayload};

#[derive(Serialize)]
struct NavigationWire<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    direction: &'static str,
    distance: u32,
    maneuver: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    eta: Option<&'a str>,
}

#[derive(Serialize)]
struct PhoneCallWire<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    caller_name: &'a str,
    caller_number: &'a str,
    call_state: &'static str,
    duration: u64,
}

/// Encoder from parsed events to firmware JSON
pub struct DataTransformer {
    profile: FormatProfile,
}

impl DataTransformer {
    pub fn new(profile: FormatProfile) -> Self {
        DataTransformer { profile }
    }

    pub fn transform_navigation(
        &self,
        event: &NavigationEvent,
    ) -> Result<WirePayload, RelayError> {
        let wire = NavigationWire {
            kind: "NAVIGATION",
            direction: wire_direction(event.direction),
            distance: event
                .distance
                .as_deref()
                .map(distance_to_meters)
                .unwrap_or(0),
            maneuver: &event.maneuver,
            eta: event.eta.as_deref(),
        };
        self.finish(EventClass::Navigation, serde_json::to_string(&wire)?)
    }

    pub fn transform_call(&self, event: &PhoneCallEvent) -> Result<WirePayload, RelayError> {
        let wire = PhoneCallWire {
            kind: "phone_call",
            caller_name: event.key.display_name(),
            caller_number: event.key.number.as_deref().unwrap_or("Unknown"),
            call_state: wire_call_state(event.state),
            duration: event.duration_secs,
        };
        self.finish(EventClass::PhoneCall, serde_json::to_string(&wire)?)
    }

    fn finish(&self, class: EventClass, json: String) -> Result<WirePayload, RelayError> {
        if json.len() > self.profile.max_payload_bytes {
            return Err(RelayError::PayloadTooLarge {
                size: json.len(),
                limit: self.profile.max_payload_bytes,
            });
        }
        Ok(WirePayload { class, json })
    }
}

fn wire_direction(direction: Direction) -> &'static str {
    match direction {
        Direction::Left => "left",
        Direction::Right => "right",
        Direction::Straight => "straight",
        Direction::UTurn => "uturn",
        Direction::SharpLeft => "sharp_left",
        Direction::SharpRight => "sharp_right",
        Direction::SlightLeft => "slight_left",
        Direction::SlightRight => "slight_right",
        Direction::RoundaboutLeft => "roundabout_left",
        Direction::RoundaboutRight => "roundabout_right",
        Direction::RoundaboutStraight => "roundabout_straight",
        Direction::MergeLeft => "merge_left",
        Direction::MergeRight => "merge_right",
        Direction::KeepLeft => "keep_left",
        Direction::KeepRight => "keep_right",
        Direction::DestinationReached => "destination",
        Direction::WaypointReached => "waypoint",
        Direction::Unknown => "straight",
    }
}

fn wire_call_state(state: CallState) -> &'static str {
    state.as_str()
}

/// Convert a unit-suffixed distance string to whole meters.
///
/// Unparseable input maps to 0 rather than an error; a missing distance is
/// not worth dropping the whole cue over.
pub(crate) fn distance_to_meters(distance: &str) -> u32 {
    let clean = distance.trim().to_lowercase();

    let (value, factor) = if let Some(v) = clean.strip_suffix("km") {
        (v, 1000.0)
    } else if let Some(v) = clean.strip_suffix("mi") {
        (v, 1609.34)
    } else if let Some(v) = clean.strip_suffix("ft") {
        (v, 0.3048)
    } else if let Some(v) = clean.strip_suffix('m') {
        (v, 1.0)
    } else {
        (clean.as_str(), 1.0)
    };

    value
        .trim()
        .parse::<f64>()
        .map(|v| (v * factor).max(0.0) as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallKey;
    use pretty_assertions::assert_eq;

    fn make_transformer() -> DataTransformer {
        DataTransformer::new(FormatProfile::default())
    }

    fn make_nav_event() -> NavigationEvent {
        NavigationEvent {
            direction: Direction::Left,
            distance: Some("200m".to_string()),
            maneuver: "Turn left onto Main Street".to_string(),
            eta: Some("< 1 min".to_string()),
        }
    }

    #[test]
    fn test_distance_to_meters() {
        assert_eq!(distance_to_meters("200m"), 200);
        assert_eq!(distance_to_meters("1.2km"), 1200);
        assert_eq!(distance_to_meters("1mi"), 1609);
        assert_eq!(distance_to_meters("100ft"), 30);
        assert_eq!(distance_to_meters("42"), 42);
        assert_eq!(distance_to_meters(""), 0);
        assert_eq!(distance_to_meters("soon"), 0);
    }

    #[test]
    fn test_navigation_wire_shape() {
        let payload = make_transformer()
            .transform_navigation(&make_nav_event())
            .expect("payload");
        assert_eq!(payload.class, EventClass::Navigation);

        let value: serde_json::Value = serde_json::from_str(&payload.json).expect("json");
        assert_eq!(value["type"], "NAVIGATION");
        assert_eq!(value["direction"], "left");
        assert_eq!(value["distance"], 200);
        assert_eq!(value["maneuver"], "Turn left onto Main Street");
        assert_eq!(value["eta"], "< 1 min");
    }

    #[test]
    fn test_navigation_eta_omitted_when_absent() {
        let mut event = make_nav_event();
        event.eta = None;
        let payload = make_transformer().transform_navigation(&event).expect("payload");
        let value: serde_json::Value = serde_json::from_str(&payload.json).expect("json");
        assert!(value.get("eta").is_none());
    }

    #[test]
    fn test_unknown_direction_encodes_as_straight() {
        let mut event = make_nav_event();
        event.direction = Direction::Unknown;
        let payload = make_transformer().transform_navigation(&event).expect("payload");
        let value: serde_json::Value = serde_json::from_str(&payload.json).expect("json");
        assert_eq!(value["direction"], "straight");
    }

    #[test]
    fn test_call_wire_shape() {
        let event = PhoneCallEvent {
            key: CallKey::new(Some("Alice".to_string()), Some("+15551234".to_string()))
                .expect("key"),
            state: CallState::Incoming,
            duration_secs: 0,
        };
        let payload = make_transformer().transform_call(&event).expect("payload");
        assert_eq!(payload.class, EventClass::PhoneCall);

        let value: serde_json::Value = serde_json::from_str(&payload.json).expect("json");
        assert_eq!(value["type"], "phone_call");
        assert_eq!(value["caller_name"], "Alice");
        assert_eq!(value["caller_number"], "+15551234");
        assert_eq!(value["call_state"], "INCOMING");
        assert_eq!(value["duration"], 0);
    }

    #[test]
    fn test_call_without_number_reports_unknown() {
        let event = PhoneCallEvent {
            key: CallKey::new(Some("Alice".to_string()), None).expect("key"),
            state: CallState::Missed,
            duration_secs: 0,
        };
        let payload = make_transformer().transform_call(&event).expect("payload");
        let value: serde_json::Value = serde_json::from_str(&payload.json).expect("json");
        assert_eq!(value["caller_name"], "Alice");
        assert_eq!(value["caller_number"], "Unknown");
        assert_eq!(value["call_state"], "MISSED");
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let transformer = DataTransformer::new(FormatProfile {
            max_payload_bytes: 32,
        });
        let result = transformer.transform_navigation(&make_nav_event());
        assert!(matches!(
            result,
            Err(RelayError::PayloadTooLarge { size: _, limit: 32 })
        ));
    }
}
