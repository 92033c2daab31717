//! Ridelink - notification relay core for handlebar displays
//!
//! Ridelink turns raw OS notifications into compact wire payloads for a BLE
//! display peripheral through a deterministic pipeline: classification →
//! extraction (navigation parsing, call state tracking) → wire encoding →
//! latest-value delivery over the link.
//!
//! ## Modules
//!
//! - **Classification**: score notifications into categories and extract fields
//! - **Navigation**: parse maneuver cues (direction, distance, ETA)
//! - **Calls**: track per-caller lifecycle and infer missed/ended calls
//! - **Link**: manage the peripheral connection with latest-value delivery

pub mod call_tracker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod keywords;
pub mod link;
pub mod parser;
pub mod relay;
pub mod transformer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use call_tracker::CallStateTracker;
pub use classifier::{CallSignal, NotificationClassifier};
pub use config::{CategoryDef, FormatProfile, LinkConfig, NavigationKeywords, RelayConfig};
pub use error::RelayError;
pub use link::{LinkManager, LinkState, LinkStatus, ScheduledTimer, TimerKind, Transport};
pub use parser::NavigationParser;
pub use relay::{Relay, RelayStatus};
pub use transformer::DataTransformer;
pub use types::{
    CallKey, CallState, Category, ClassificationTier, ClassifiedNotification, Direction,
    EventClass, FeedEvent, NavigationEvent, PhoneCallEvent, RawNotification, WirePayload,
};

/// Ridelink version reported over FFI and in diagnostics
pub const RIDELINK_VERSION: &str = env!("CARGO_PKG_VERSION");
