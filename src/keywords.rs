//! Keyword tables for text extraction
//!
//! Static phrase tables scanned against lowercased notification text. The
//! direction table is ordered most-specific-first: "sharp left" must win
//! before a generic "turn left" entry gets a chance, so scanning stops at
//! the first phrase that matches.
//!
//! Call-state tables carry the non-English phrases OEM dialers ship in
//! regional locales; matching is plain substring containment throughout.

use crate::types::Direction;

/// Direction phrases, most specific first. First match wins.
pub const DIRECTION_PHRASES: &[(Direction, &[&str])] = &[
    (
        Direction::UTurn,
        &["u-turn", "u turn", "make a u-turn", "turn around"],
    ),
    (
        Direction::SharpLeft,
        &["sharp left", "turn sharply left", "sharp turn left"],
    ),
    (
        Direction::SharpRight,
        &["sharp right", "turn sharply right", "sharp turn right"],
    ),
    (
        Direction::SlightLeft,
        &["slight left", "slightly left", "bear left"],
    ),
    (
        Direction::SlightRight,
        &["slight right", "slightly right", "bear right"],
    ),
    (Direction::MergeLeft, &["merge left"]),
    (Direction::MergeRight, &["merge right"]),
    (Direction::KeepLeft, &["keep left", "stay left"]),
    (Direction::KeepRight, &["keep right", "stay right"]),
    (Direction::WaypointReached, &["waypoint"]),
    (
        Direction::Left,
        &[
            "turn left",
            "left turn",
            "go left",
            "veer left",
            "take left",
            "exit left",
            "left onto",
            "left on",
            "left at",
        ],
    ),
    (
        Direction::Right,
        &[
            "turn right",
            "right turn",
            "go right",
            "veer right",
            "take right",
            "exit right",
            "right onto",
            "right on",
            "right at",
        ],
    ),
    (
        Direction::Straight,
        &[
            "go straight",
            "continue straight",
            "straight ahead",
            "keep straight",
            "proceed straight",
            "stay straight",
            "head straight",
            "head north",
            "head south",
            "head east",
            "head west",
            "continue on",
            "continue",
        ],
    ),
];

/// Named maneuver words promoted to the maneuver field when present
pub const MANEUVER_KEYWORDS: &[&str] = &[
    "roundabout",
    "exit",
    "ramp",
    "fork",
    "merge",
    "junction",
    "lane",
    "highway",
    "bridge",
    "tunnel",
    "ferry",
    "toll",
];

/// Words that mark a text as plausibly a navigation cue at all
pub const NAVIGATION_HINT_KEYWORDS: &[&str] = &[
    "turn",
    "left",
    "right",
    "straight",
    "continue",
    "exit",
    "merge",
    "ramp",
    "highway",
    "street",
    "road",
    "miles",
    "meters",
    "km",
    "feet",
    "onto",
    "toward",
    "via",
    "head",
    "north",
    "south",
    "east",
    "west",
    "navigate",
    "route",
    "destination",
    "arrive",
];

/// Arrival phrases checked before the direction table
pub const DESTINATION_KEYWORDS: &[&str] = &[
    "you have arrived",
    "your destination",
    "you've arrived",
    "arrived",
    "arrive",
    "destination",
    "reached",
];

/// Roundabout entry markers
pub const ROUNDABOUT_KEYWORDS: &[&str] = &["roundabout", "traffic circle"];

/// Dialing-style texts an OS shows while placing an outgoing call.
/// Checked before the incoming table so "Calling..." never reads as incoming.
pub const DIALING_KEYWORDS: &[&str] = &[
    "calling...",
    "calling\u{2026}",
    "dialing",
    "connecting",
    "outgoing",
];

pub const INCOMING_KEYWORDS: &[&str] = &[
    "incoming call",
    "incoming",
    "ringing",
    "call from",
    "is calling",
    // Hindi
    "आने वाला कॉल",
    "कॉल आ रही",
    "रिंगिंग",
    // Bengali
    "আসন্ন কল",
    "কলিং",
    // Tamil
    "வரும் அழைப்பு",
    // Telugu
    "వచ్చే కాల్",
    // Gujarati
    "આવતી કોલ",
    // Marathi
    "येणारी कॉल",
    // Punjabi
    "ਆਉਣ ਵਾਲੀ ਕਾਲ",
];

pub const ONGOING_KEYWORDS: &[&str] = &[
    "in call",
    "call in progress",
    "ongoing call",
    "call duration",
    // Hindi
    "कॉल चल रही",
    "कॉल प्रगति में",
    // Bengali
    "কল চলছে",
    "চলমান কল",
    // Tamil
    "அழைப்பு நடைபெறுகிறது",
    // Telugu
    "కాల్ జరుగుతోంది",
];

pub const MISSED_KEYWORDS: &[&str] = &[
    "missed call",
    "call missed",
    "missed",
    // Hindi
    "मिस्ड कॉल",
    "चूकी कॉल",
    // Bengali
    "মিসড কল",
    // Tamil
    "தவறிய அழைப்பு",
    // Telugu
    "మిస్డ్ కాల్",
    // Gujarati
    "મિસ્ડ કોલ",
    // Punjabi
    "ਮਿਸਡ ਕਾਲ",
];

pub const ENDED_KEYWORDS: &[&str] = &[
    "call ended",
    "call finished",
    "call completed",
    // Hindi
    "कॉल समाप्त",
    "कॉल खत्म",
    // Bengali
    "কল শেষ",
    // Tamil
    "அழைப்பு முடிந்தது",
    // Telugu
    "కాల్ ముగిసింది",
];

/// Returns true when `haystack` (already lowercased) contains any keyword
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Count of distinct keywords present in `haystack` (already lowercased)
pub fn count_matches(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| haystack.contains(*k)).count()
}
