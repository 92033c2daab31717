//! Core types for Ridelink
//!
//! This module defines the event model that flows through the relay:
//! - Raw notifications as delivered by the OS listener
//! - Classified notifications with category, confidence, and extracted fields
//! - Navigation and phone-call events
//! - Wire payloads handed to the link layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A notification as delivered by the host OS, before any interpretation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNotification {
    /// Originating app identifier (package name / bundle id)
    pub source: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Expanded body text, when the OS exposes one
    #[serde(default)]
    pub big_text: String,
    /// Structured phone number extra, when the OS exposes one
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default = "Utc::now")]
    pub posted_at: DateTime<Utc>,
}

impl RawNotification {
    /// Title, text, and expanded text joined for keyword scanning
    pub fn combined_text(&self) -> String {
        let mut out = String::new();
        for part in [&self.title, &self.text, &self.big_text] {
            if part.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(part);
        }
        out
    }
}

/// A notification event from the host feed: a post or a removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    #[serde(flatten)]
    pub raw: RawNotification,
    /// True when the OS removed the notification from the shade
    #[serde(default)]
    pub removed: bool,
}

/// Semantic category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Navigation,
    PhoneCall,
    Message,
    /// Recognized but not relayed as a dedicated event (battery, music, ...)
    Other,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Navigation => "navigation",
            Category::PhoneCall => "phone_call",
            Category::Message => "message",
            Category::Other => "other",
            Category::Unknown => "unknown",
        }
    }
}

/// Which tier of the classifier produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationTier {
    /// Matched a user-configured category definition
    Configured,
    /// Matched a built-in fallback definition
    Fallback,
    /// Nothing matched
    Unknown,
}

/// Output of the classifier for a single notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedNotification {
    pub category: Category,
    /// Stable category identifier, preserved even when `category` collapses
    /// to `Other` (e.g. "battery", "music")
    pub kind_id: String,
    /// Match score: 1000 per app match, 50 per title pattern, 10 per keyword
    pub confidence: u32,
    pub tier: ClassificationTier,
    /// Category-specific extracted fields
    pub fields: HashMap<String, String>,
}

/// Maneuver direction for a navigation cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Straight,
    UTurn,
    SharpLeft,
    SharpRight,
    SlightLeft,
    SlightRight,
    RoundaboutLeft,
    RoundaboutRight,
    RoundaboutStraight,
    MergeLeft,
    MergeRight,
    KeepLeft,
    KeepRight,
    DestinationReached,
    WaypointReached,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Straight => "straight",
            Direction::UTurn => "u_turn",
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
            Direction::DestinationReached => "destination_reached",
            Direction::WaypointReached => "waypoint_reached",
            Direction::Unknown => "unknown",
        }
    }
}

/// A parsed navigation cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub direction: Direction,
    /// Distance string with its unit suffix preserved (e.g. "200m", "1.2km")
    pub distance: Option<String>,
    /// Maneuver description with distance fragments stripped
    pub maneuver: String,
    /// Estimated time to the maneuver (e.g. "2 min", "Arrived")
    pub eta: Option<String>,
}

/// Phone call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Incoming,
    Ongoing,
    Missed,
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Incoming => "INCOMING",
            CallState::Ongoing => "ONGOING",
            CallState::Missed => "MISSED",
            CallState::Ended => "ENDED",
        }
    }
}

/// Identity of a call, as much of it as the notification exposed.
///
/// At least one of `name` and `number` is always present; signals where both
/// are unknown are discarded before a key is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallKey {
    pub name: Option<String>,
    pub number: Option<String>,
}

impl CallKey {
    /// Build a key, rejecting the all-unknown case
    pub fn new(name: Option<String>, number: Option<String>) -> Option<Self> {
        let name = name.filter(|s| !s.is_empty());
        let number = number.filter(|s| !s.is_empty());
        if name.is_none() && number.is_none() {
            return None;
        }
        Some(CallKey { name, number })
    }

    /// Best available display label for the caller
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.number.as_deref())
            .unwrap_or("")
    }
}

/// A phone-call state transition to relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneCallEvent {
    pub key: CallKey,
    pub state: CallState,
    /// Call duration in seconds, when known (0 otherwise)
    pub duration_secs: u64,
}

/// Which latest-value slot a wire payload occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    Navigation,
    PhoneCall,
}

/// An encoded payload ready for the link layer
#[derive(Debug, Clone, PartialEq)]
pub struct WirePayload {
    pub class: EventClass,
    pub json: String,
}

impl WirePayload {
    pub fn len(&self) -> usize {
        self.json.len()
    }

    pub fn is_empty(&self) -> bool {
        self.json.is_empty()
    }
}
