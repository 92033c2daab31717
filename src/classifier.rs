//! Notification classification
//!
//! Three tiers, scored identically: user-configured category definitions
//! first, built-in fallback definitions second, and a catch-all unknown
//! result so classification is total. Score is 1000 per app match, 50 per
//! title pattern hit, 10 per body keyword hit; ties resolve to the earliest
//! definition in the list.
//!
//! Also hosts caller extraction for phone-call notifications, which is
//! keyword- and regex-driven because OEM dialers disagree wildly on layout.

use regex::Regex;
use std::collections::HashMap;

use crate::config::CategoryDef;
use crate::error::RelayError;
use crate::keywords::{
    contains_any, DIALING_KEYWORDS, ENDED_KEYWORDS, INCOMING_KEYWORDS, MISSED_KEYWORDS,
    ONGOING_KEYWORDS,
};
use crate::types::{
    CallKey, CallState, Category, ClassificationTier, ClassifiedNotification, RawNotification,
};

/// A phone-call reading of a single notification
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignal {
    pub key: CallKey,
    pub state: CallState,
    /// True when the text looked like a dialing screen ("Calling...")
    pub outgoing_hint: bool,
}

pub struct NotificationClassifier {
    configured: Vec<CategoryDef>,
    fallbacks: Vec<CategoryDef>,
    number_res: Vec<Regex>,
    clock_re: Regex,
    app_prefix_re: Regex,
    call_phrase_re: Regex,
    time_token_re: Regex,
    not_a_name_re: Regex,
    percent_re: Regex,
}

impl NotificationClassifier {
    pub fn new(configured: Vec<CategoryDef>) -> Result<Self, RelayError> {
        Ok(NotificationClassifier {
            configured,
            fallbacks: builtin_fallbacks(),
            number_res: vec![
                Regex::new(r"\+\d{10,15}")?,
                Regex::new(r"\b[6-9]\d{9}\b")?,
                Regex::new(r"\b\d{10,15}\b")?,
            ],
            clock_re: Regex::new(r"(?i)^\d{1,2}:\d{2}\s?(am|pm)$")?,
            app_prefix_re: Regex::new(r"(?i)^\s*(call|phone|dialer)\s+")?,
            call_phrase_re: Regex::new(
                r"(?i)\s*(incoming call from|missed call from|call from|incoming call|missed call|ongoing call|call in progress|call ended|in call|is calling|calling\.{0,3}|calling\u{2026}|ringing)\s*",
            )?,
            time_token_re: Regex::new(r"\b\d{1,2}:\d{2}(:\d{2})?\b")?,
            not_a_name_re: Regex::new(r"^[\d\s\+\-\(\)\.]+$")?,
            percent_re: Regex::new(r"(\d+)%")?,
        })
    }

    /// Classify a notification. Always returns a result; nothing matching
    /// lands in the unknown tier with confidence 0.
    pub fn classify(&self, raw: &RawNotification) -> ClassifiedNotification {
        let all_text = raw.combined_text().to_lowercase();

        if let Some((def, score)) = best_match(&self.configured, raw, &all_text) {
            return self.build(def, score, ClassificationTier::Configured, raw);
        }
        if let Some((def, score)) = best_match(&self.fallbacks, raw, &all_text) {
            return self.build(def, score, ClassificationTier::Fallback, raw);
        }

        let mut fields = HashMap::new();
        fields.insert("raw_text".to_string(), raw.text.clone());
        fields.insert("title".to_string(), raw.title.clone());
        fields.insert("source".to_string(), raw.source.clone());
        ClassifiedNotification {
            category: Category::Unknown,
            kind_id: "unknown".to_string(),
            confidence: 0,
            tier: ClassificationTier::Unknown,
            fields,
        }
    }

    fn build(
        &self,
        def: &CategoryDef,
        score: u32,
        tier: ClassificationTier,
        raw: &RawNotification,
    ) -> ClassifiedNotification {
        ClassifiedNotification {
            category: category_for_id(&def.id),
            kind_id: def.id.clone(),
            confidence: score,
            tier,
            fields: self.extract_fields(&def.id, raw),
        }
    }

    /// Category-specific field extraction, keyed by the definition id so
    /// configured categories reuse the built-in extractors
    fn extract_fields(&self, kind_id: &str, raw: &RawNotification) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        match kind_id {
            "phone_call" => {
                if let Some(signal) = self.call_signal(raw) {
                    fields.insert(
                        "caller".to_string(),
                        signal.key.display_name().to_string(),
                    );
                    fields.insert("state".to_string(), signal.state.as_str().to_string());
                }
                fields.insert("raw_text".to_string(), raw.combined_text());
            }
            "navigation" => {
                fields.insert("raw_text".to_string(), raw.combined_text());
            }
            "message" => {
                fields.insert("sender".to_string(), raw.title.clone());
                let body = if raw.text.is_empty() {
                    raw.big_text.clone()
                } else {
                    raw.text.clone()
                };
                fields.insert("message".to_string(), body);
            }
            "battery" => {
                let text = raw.combined_text();
                if let Some(caps) = self.percent_re.captures(&text) {
                    fields.insert("percentage".to_string(), caps[1].to_string());
                }
                let charging = text.to_lowercase().contains("charging");
                fields.insert("is_charging".to_string(), charging.to_string());
            }
            _ => {
                fields.insert("raw_text".to_string(), raw.text.clone());
                fields.insert("title".to_string(), raw.title.clone());
            }
        }
        fields
    }

    /// Read a notification as a call-state signal, or `None` when no caller
    /// identity can be extracted at all
    pub fn call_signal(&self, raw: &RawNotification) -> Option<CallSignal> {
        let (state, outgoing_hint) = detect_call_state(raw);
        let key = self.extract_caller(raw)?;
        Some(CallSignal {
            key,
            state,
            outgoing_hint,
        })
    }

    fn extract_caller(&self, raw: &RawNotification) -> Option<CallKey> {
        let combined = raw.combined_text();

        // Dialing screens and empty bodies carry the name in the title alone
        let text_lower = raw.text.trim().to_lowercase();
        let candidate = if (text_lower.is_empty() || contains_any(&text_lower, DIALING_KEYWORDS))
            && !raw.title.is_empty()
        {
            raw.title.clone()
        } else {
            combined.clone()
        };

        let kept: Vec<&str> = candidate
            .split('\n')
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                !line.is_empty()
                    && lower != "null"
                    && lower != "call"
                    && !lower.contains("incoming")
                    && !lower.contains("missed")
                    && !lower.contains("ongoing")
                    && !lower.contains("ringing")
                    && !self.clock_re.is_match(line)
            })
            .collect();
        // A single-line candidate like "Alice Incoming call" filters itself
        // away entirely; fall back to the unfiltered text and let the phrase
        // stripping below recover the name
        let joined = if kept.is_empty() {
            candidate.clone()
        } else {
            kept.join(" ")
        };

        let cleaned = self.call_phrase_re.replace_all(&joined, " ");
        let cleaned = self.time_token_re.replace_all(&cleaned, " ");
        let cleaned = self.app_prefix_re.replace(&cleaned, "");
        let cleaned = cleaned
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches('.')
            .trim()
            .to_string();

        let number = raw
            .phone_number
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.find_number(&combined));

        let name = if cleaned.is_empty()
            || cleaned.eq_ignore_ascii_case("null")
            || self.not_a_name_re.is_match(&cleaned)
        {
            None
        } else {
            Some(cleaned)
        };

        CallKey::new(name, number)
    }

    fn find_number(&self, text: &str) -> Option<String> {
        self.number_res
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| m.as_str().to_string())
    }
}

/// Call state from notification text. Missed markers win before incoming
/// ones because "Missed call from X" also contains "call from".
fn detect_call_state(raw: &RawNotification) -> (CallState, bool) {
    let text = raw.text.to_lowercase();
    let combined = raw.combined_text().to_lowercase();

    if contains_any(&text, DIALING_KEYWORDS) {
        return (CallState::Ongoing, true);
    }
    if contains_any(&combined, MISSED_KEYWORDS) {
        return (CallState::Missed, false);
    }
    if contains_any(&combined, INCOMING_KEYWORDS) {
        return (CallState::Incoming, false);
    }
    if contains_any(&combined, ONGOING_KEYWORDS) {
        return (CallState::Ongoing, false);
    }
    if contains_any(&combined, ENDED_KEYWORDS) {
        return (CallState::Ended, false);
    }
    // Bare title with no body is how most dialers ring
    (CallState::Incoming, false)
}

fn score(def: &CategoryDef, raw: &RawNotification, all_text: &str) -> u32 {
    let mut score = 0u32;
    if def.apps.iter().any(|app| *app == raw.source) {
        score += 1000;
    }
    let title_lower = raw.title.to_lowercase();
    let title_hits = def
        .title_patterns
        .iter()
        .filter(|p| title_lower.contains(&p.to_lowercase()))
        .count() as u32;
    score += title_hits * 50;

    let keyword_hits = def
        .keywords
        .iter()
        .filter(|k| all_text.contains(&k.to_lowercase()))
        .count() as u32;
    score += keyword_hits * 10;
    score
}

/// Highest strictly-positive score wins; on a tie the earlier definition
/// keeps it (strict `>` scan)
fn best_match<'a>(
    defs: &'a [CategoryDef],
    raw: &RawNotification,
    all_text: &str,
) -> Option<(&'a CategoryDef, u32)> {
    let mut best: Option<(&CategoryDef, u32)> = None;
    for def in defs.iter().filter(|d| d.enabled) {
        let s = score(def, raw, all_text);
        if s > 0 && best.map_or(true, |(_, bs)| s > bs) {
            best = Some((def, s));
        }
    }
    best
}

fn category_for_id(id: &str) -> Category {
    match id {
        "navigation" => Category::Navigation,
        "phone_call" => Category::PhoneCall,
        "message" => Category::Message,
        "unknown" => Category::Unknown,
        _ => Category::Other,
    }
}

fn builtin_fallbacks() -> Vec<CategoryDef> {
    vec![
        CategoryDef {
            id: "phone_call".to_string(),
            enabled: true,
            apps: vec![
                "com.android.dialer".to_string(),
                "com.android.incallui".to_string(),
                "com.android.server.telecom".to_string(),
                "com.samsung.android.dialer".to_string(),
                "com.samsung.android.incallui".to_string(),
                "com.google.android.dialer".to_string(),
                "com.google.android.incallui".to_string(),
                "com.miui.incallui".to_string(),
                "com.oneplus.incallui".to_string(),
                "com.coloros.incallui".to_string(),
                "com.vivo.incallui".to_string(),
                "com.motorola.incallui".to_string(),
                "com.huawei.incallui".to_string(),
            ],
            keywords: vec![
                "incoming call".to_string(),
                "missed call".to_string(),
                "call ended".to_string(),
                "calling".to_string(),
                "phone".to_string(),
            ],
            title_patterns: vec![
                "Phone".to_string(),
                "Call".to_string(),
                "Dialer".to_string(),
            ],
        },
        CategoryDef {
            id: "navigation".to_string(),
            enabled: true,
            apps: vec![
                "com.google.android.apps.maps".to_string(),
                "com.waze".to_string(),
            ],
            keywords: vec![
                "head".to_string(),
                "turn".to_string(),
                "exit".to_string(),
                "destination".to_string(),
                "arrived".to_string(),
                "continue".to_string(),
                "keep".to_string(),
                "merge".to_string(),
            ],
            title_patterns: vec![
                "Google Maps".to_string(),
                "Waze".to_string(),
                "Navigation".to_string(),
            ],
        },
        CategoryDef {
            id: "message".to_string(),
            enabled: true,
            apps: vec![
                "com.whatsapp".to_string(),
                "com.samsung.android.messaging".to_string(),
                "org.telegram.messenger".to_string(),
            ],
            keywords: vec![
                "new message".to_string(),
                "sent you".to_string(),
                "message from".to_string(),
            ],
            title_patterns: vec![
                "WhatsApp".to_string(),
                "Telegram".to_string(),
                "Messages".to_string(),
            ],
        },
        CategoryDef {
            id: "battery".to_string(),
            enabled: true,
            apps: vec!["com.android.systemui".to_string()],
            keywords: vec![
                "charging".to_string(),
                "battery".to_string(),
                "plugged in".to_string(),
                "fast charging".to_string(),
            ],
            title_patterns: vec!["Charging".to_string(), "Battery".to_string()],
        },
    ]
}
