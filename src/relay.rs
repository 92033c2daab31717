//! Relay service
//!
//! Wires the classifier, navigation parser, call tracker, transformer, and
//! link manager into one explicitly constructed object. The host feeds
//! notification events and transport callbacks in; encoded payloads go out
//! through the link.
//!
//! Timers scheduled by the link manager are armed here on the current Tokio
//! runtime. Without a runtime the relay still works; deferred transitions
//! just have to be driven by calling the link callbacks directly.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::call_tracker::CallStateTracker;
use crate::classifier::NotificationClassifier;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::link::{LinkManager, LinkStatus, Transport};
use crate::parser::NavigationParser;
use crate::transformer::DataTransformer;
use crate::types::{Category, FeedEvent, RawNotification, WirePayload};

/// Diagnostic snapshot of a running relay
#[derive(Debug, Clone)]
pub struct RelayStatus {
    pub instance_id: String,
    pub link: LinkStatus,
}

pub struct Relay<T: Transport + 'static> {
    classifier: NotificationClassifier,
    parser: NavigationParser,
    transformer: DataTransformer,
    tracker: Mutex<CallStateTracker>,
    link: Arc<Mutex<LinkManager<T>>>,
    instance_id: String,
}

impl<T: Transport + 'static> Relay<T> {
    pub fn new(config: RelayConfig, transport: T) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Relay {
            classifier: NotificationClassifier::new(config.categories.clone())?,
            parser: NavigationParser::with_keywords(&config.keywords)?,
            transformer: DataTransformer::new(config.format.clone()),
            tracker: Mutex::new(CallStateTracker::new()),
            link: Arc::new(Mutex::new(LinkManager::new(config.link, transport))),
            instance_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            instance_id: self.instance_id.clone(),
            link: lock(&self.link).status(),
        }
    }

    /// Start scanning for the display peripheral
    pub fn start(&self) {
        lock(&self.link).start();
        self.arm_timers();
    }

    /// Disconnect and stay down until the next `start`
    pub fn disconnect(&self) {
        lock(&self.link).disconnect();
    }

    /// Feed one event from the host notification stream
    pub fn handle(&self, event: &FeedEvent) {
        if event.removed {
            self.on_removed(&event.raw);
        } else {
            self.on_posted(&event.raw);
        }
    }

    pub fn on_posted(&self, raw: &RawNotification) {
        let classified = self.classifier.classify(raw);
        debug!(
            source = %raw.source,
            kind = %classified.kind_id,
            confidence = classified.confidence,
            "notification classified"
        );

        match classified.category {
            Category::Navigation => self.relay_navigation(raw),
            Category::PhoneCall => self.relay_call_post(raw),
            Category::Message | Category::Other | Category::Unknown => {
                debug!(kind = %classified.kind_id, "not relayed");
            }
        }
    }

    pub fn on_removed(&self, raw: &RawNotification) {
        let classified = self.classifier.classify(raw);
        if classified.category != Category::PhoneCall {
            return;
        }
        let Some(signal) = self.classifier.call_signal(raw) else {
            return;
        };
        let events = self
            .tracker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .observe_removed(&signal.key, Instant::now());
        for event in events {
            match self.transformer.transform_call(&event) {
                Ok(payload) => self.dispatch(payload),
                Err(e) => warn!(error = %e, "call payload rejected"),
            }
        }
    }

    fn relay_navigation(&self, raw: &RawNotification) {
        let text = raw.combined_text();
        if !self.parser.is_navigation_text(&text) {
            return;
        }
        let Some(event) = self.parser.parse(&text) else {
            debug!("no navigation cue extracted");
            return;
        };
        match self.transformer.transform_navigation(&event) {
            Ok(payload) => self.dispatch(payload),
            Err(e) => warn!(error = %e, "navigation payload rejected"),
        }
    }

    fn relay_call_post(&self, raw: &RawNotification) {
        let Some(signal) = self.classifier.call_signal(raw) else {
            debug!("phone notification without caller identity");
            return;
        };
        let events = self
            .tracker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .observe(signal.key, signal.state, signal.outgoing_hint, Instant::now());
        for event in events {
            match self.transformer.transform_call(&event) {
                Ok(payload) => self.dispatch(payload),
                Err(e) => warn!(error = %e, "call payload rejected"),
            }
        }
    }

    fn dispatch(&self, payload: WirePayload) {
        lock(&self.link).offer(payload);
    }

    // Transport callbacks, forwarded by the host platform. Each may leave a
    // timer armed on the link manager, so the pump runs after every one.

    pub fn on_peer_found(&self, name: &str, address: &str) {
        lock(&self.link).on_peer_found(name, address);
        self.arm_timers();
    }

    pub fn on_connected(&self) {
        lock(&self.link).on_connected();
        self.arm_timers();
    }

    pub fn on_connect_failed(&self) {
        lock(&self.link).on_connect_failed();
        self.arm_timers();
    }

    pub fn on_services_resolved(&self, found: bool) {
        lock(&self.link).on_services_resolved(found);
        self.arm_timers();
    }

    pub fn on_link_lost(&self) {
        lock(&self.link).on_link_lost();
        self.arm_timers();
    }

    pub fn on_write_complete(&self, ok: bool) {
        lock(&self.link).on_write_complete(ok);
        self.arm_timers();
    }

    fn arm_timers(&self) {
        arm_timers(&self.link);
    }
}

fn lock<T: Transport>(link: &Arc<Mutex<LinkManager<T>>>) -> MutexGuard<'_, LinkManager<T>> {
    link.lock().unwrap_or_else(|e| e.into_inner())
}

/// Arm any timer the link manager has scheduled as a sleep task on the
/// current Tokio runtime. Firing re-arms, so timer chains (scan timeout
/// leading to reconnect leading to a fresh scan) keep running unattended.
fn arm_timers<T: Transport + 'static>(link: &Arc<Mutex<LinkManager<T>>>) {
    while let Some(timer) = lock(link).take_scheduled_timer() {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(kind = ?timer.kind, "no runtime; timer must be fired manually");
            return;
        };
        let link = Arc::clone(link);
        handle.spawn(async move {
            tokio::time::sleep(timer.delay).await;
            lock(&link).fire_timer(timer.kind, timer.generation);
            arm_timers(&link);
        });
    }
}
