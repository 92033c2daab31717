//! Link management
//!
//! Drives the connection to the display peripheral through a `Transport`
//! implementation supplied by the host platform. The manager itself is a
//! synchronous state machine: platform callbacks feed `on_*` methods, and
//! delayed work (scan timeout, reconnect backoff) is exposed as scheduled
//! timers the service layer arms. Each scheduled timer carries a generation
//! number; firing with a stale generation is a no-op, which makes cancelled
//! timers harmless.
//!
//! Delivery is latest-value-wins per event class: the newest navigation and
//! phone-call payloads are retained, at most one write is in flight, and a
//! payload arriving mid-write replaces whatever was queued behind it. On
//! reaching ready the retained payloads are resent once so a freshly
//! (re)connected display catches up immediately.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::RelayError;
use crate::types::{EventClass, WirePayload};

/// Platform-facing transport operations. Completions come back through the
/// manager's `on_*` callbacks.
pub trait Transport: Send {
    fn start_scan(&mut self);
    fn stop_scan(&mut self);
    fn connect(&mut self, address: &str);
    fn discover_services(&mut self);
    fn write(&mut self, bytes: &[u8]);
    fn disconnect(&mut self);
}

/// Link lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Scanning,
    Connecting,
    /// Connected, service discovery still running
    Discovering,
    Ready,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Scanning => "scanning",
            LinkState::Connecting => "connecting",
            LinkState::Discovering => "discovering",
            LinkState::Ready => "ready",
        }
    }
}

/// Deferred work the service layer must arm with a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ScanTimeout,
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub kind: TimerKind,
    pub delay: Duration,
    pub generation: u64,
}

/// Counters and state snapshot for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: &'static str,
    pub peer_address: Option<String>,
    pub writes_ok: u64,
    pub writes_failed: u64,
}

pub struct LinkManager<T: Transport> {
    transport: T,
    config: LinkConfig,
    state: LinkState,
    generation: u64,
    pending_timer: Option<ScheduledTimer>,
    peer_address: Option<String>,
    user_disconnected: bool,
    last_nav: Option<WirePayload>,
    last_call: Option<WirePayload>,
    write_in_flight: bool,
    queued_write: Option<WirePayload>,
    writes_ok: u64,
    writes_failed: u64,
}

impl<T: Transport> LinkManager<T> {
    pub fn new(config: LinkConfig, transport: T) -> Self {
        LinkManager {
            transport,
            config,
            state: LinkState::Disconnected,
            generation: 0,
            pending_timer: None,
            peer_address: None,
            user_disconnected: false,
            last_nav: None,
            last_call: None,
            write_in_flight: false,
            queued_write: None,
            writes_ok: 0,
            writes_failed: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state.as_str(),
            peer_address: self.peer_address.clone(),
            writes_ok: self.writes_ok,
            writes_failed: self.writes_failed,
        }
    }

    /// Begin scanning for the peripheral. No-op unless disconnected.
    pub fn start(&mut self) {
        if self.state != LinkState::Disconnected {
            debug!(state = self.state.as_str(), "start ignored");
            return;
        }
        self.user_disconnected = false;
        self.state = LinkState::Scanning;
        info!(peer = %self.config.peer_name, "scanning");
        self.transport.start_scan();
        self.schedule(TimerKind::ScanTimeout, Duration::from_millis(self.config.scan_timeout_ms));
    }

    /// Tear the link down and stay down until the next explicit `start`
    pub fn disconnect(&mut self) {
        info!("explicit disconnect");
        self.user_disconnected = true;
        self.cancel_timer();
        if self.state == LinkState::Scanning {
            self.transport.stop_scan();
        }
        if self.state != LinkState::Disconnected {
            self.transport.disconnect();
        }
        self.drop_link_state();
    }

    /// Scan callback: a peripheral advertised itself
    pub fn on_peer_found(&mut self, name: &str, address: &str) {
        if self.state != LinkState::Scanning || name != self.config.peer_name {
            return;
        }
        info!(name, address, "peer found");
        self.cancel_timer();
        self.transport.stop_scan();
        self.state = LinkState::Connecting;
        self.peer_address = Some(address.to_string());
        self.transport.connect(address);
    }

    /// Connect callback: the physical link is up
    pub fn on_connected(&mut self) {
        if self.state != LinkState::Connecting {
            return;
        }
        self.state = LinkState::Discovering;
        self.transport.discover_services();
    }

    pub fn on_connect_failed(&mut self) {
        if self.state != LinkState::Connecting {
            return;
        }
        warn!("connect failed");
        self.drop_link_state();
        self.schedule_reconnect();
    }

    /// Discovery callback. `found` reports whether the expected service and
    /// characteristic were present. A peripheral without them is the wrong
    /// device or firmware; we stay connected-discovering and say so rather
    /// than pretend to be ready.
    pub fn on_services_resolved(&mut self, found: bool) {
        if self.state != LinkState::Discovering {
            return;
        }
        if !found {
            warn!(
                service = %self.config.service_uuid,
                "expected service not found on peer"
            );
            return;
        }
        info!("link ready");
        self.state = LinkState::Ready;
        self.resend_retained();
    }

    /// Any unsolicited loss of the link
    pub fn on_link_lost(&mut self) {
        if self.state == LinkState::Disconnected {
            return;
        }
        warn!("link lost");
        if self.state == LinkState::Scanning {
            self.transport.stop_scan();
        }
        self.drop_link_state();
        self.schedule_reconnect();
    }

    /// Write completion callback from the transport
    pub fn on_write_complete(&mut self, ok: bool) {
        self.write_in_flight = false;
        if ok {
            self.writes_ok += 1;
        } else {
            self.writes_failed += 1;
            warn!("write failed");
        }
        if self.state != LinkState::Ready {
            self.queued_write = None;
            return;
        }
        if let Some(next) = self.queued_write.take() {
            self.write_in_flight = true;
            self.transport.write(next.json.as_bytes());
        }
    }

    /// Strict send: fails immediately when the link is not ready. The
    /// payload still replaces the retained snapshot for its class, so it is
    /// delivered on the next ready.
    pub fn send(&mut self, payload: WirePayload) -> Result<(), RelayError> {
        self.retain(&payload);
        if self.state != LinkState::Ready {
            return Err(RelayError::LinkNotReady(self.state.as_str().to_string()));
        }
        self.push_write(payload);
        Ok(())
    }

    /// Relaxed send: retain always, deliver when ready, drop silently (with
    /// a log line) otherwise
    pub fn offer(&mut self, payload: WirePayload) {
        self.retain(&payload);
        if self.state == LinkState::Ready {
            self.push_write(payload);
        } else {
            debug!(state = self.state.as_str(), "payload retained until ready");
        }
    }

    /// Fire a previously scheduled timer. Stale generations are ignored.
    pub fn fire_timer(&mut self, kind: TimerKind, generation: u64) {
        if generation != self.generation {
            debug!(?kind, "stale timer ignored");
            return;
        }
        self.pending_timer = None;
        match kind {
            TimerKind::ScanTimeout => {
                if self.state == LinkState::Scanning {
                    warn!("scan timed out");
                    self.transport.stop_scan();
                    self.drop_link_state();
                    self.schedule_reconnect();
                }
            }
            TimerKind::Reconnect => {
                if self.state == LinkState::Disconnected && !self.user_disconnected {
                    self.start();
                }
            }
        }
    }

    /// Hand the armed timer to the service layer, if one is pending
    pub fn take_scheduled_timer(&mut self) -> Option<ScheduledTimer> {
        self.pending_timer.take()
    }

    fn retain(&mut self, payload: &WirePayload) {
        match payload.class {
            EventClass::Navigation => self.last_nav = Some(payload.clone()),
            EventClass::PhoneCall => self.last_call = Some(payload.clone()),
        }
    }

    fn push_write(&mut self, payload: WirePayload) {
        if self.write_in_flight {
            // Queue of one: a newer payload replaces the waiting one
            self.queued_write = Some(payload);
        } else {
            self.write_in_flight = true;
            self.transport.write(payload.json.as_bytes());
        }
    }

    fn resend_retained(&mut self) {
        let retained: Vec<WirePayload> = self
            .last_nav
            .clone()
            .into_iter()
            .chain(self.last_call.clone())
            .collect();
        for payload in retained {
            self.push_write(payload);
        }
    }

    fn drop_link_state(&mut self) {
        self.state = LinkState::Disconnected;
        self.write_in_flight = false;
        self.queued_write = None;
        self.peer_address = None;
    }

    fn schedule_reconnect(&mut self) {
        if self.user_disconnected {
            return;
        }
        self.schedule(
            TimerKind::Reconnect,
            Duration::from_millis(self.config.reconnect_delay_ms),
        );
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.generation += 1;
        self.pending_timer = Some(ScheduledTimer {
            kind,
            delay,
            generation: self.generation,
        });
    }

    fn cancel_timer(&mut self) {
        self.generation += 1;
        self.pending_timer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Action {
        StartScan,
        StopScan,
        Connect(String),
        Discover,
        Write(String),
        Disconnect,
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        actions: Arc<Mutex<Vec<Action>>>,
    }

    impl MockTransport {
        fn record(&self, action: Action) {
            self.actions.lock().unwrap().push(action);
        }

        fn take(&self) -> Vec<Action> {
            std::mem::take(&mut *self.actions.lock().unwrap())
        }
    }

    impl Transport for MockTransport {
        fn start_scan(&mut self) {
            self.record(Action::StartScan);
        }
        fn stop_scan(&mut self) {
            self.record(Action::StopScan);
        }
        fn connect(&mut self, address: &str) {
            self.record(Action::Connect(address.to_string()));
        }
        fn discover_services(&mut self) {
            self.record(Action::Discover);
        }
        fn write(&mut self, bytes: &[u8]) {
            self.record(Action::Write(String::from_utf8_lossy(bytes).to_string()));
        }
        fn disconnect(&mut self) {
            self.record(Action::Disconnect);
        }
    }

    fn make_link() -> (LinkManager<MockTransport>, MockTransport) {
        let transport = MockTransport::default();
        let link = LinkManager::new(LinkConfig::default(), transport.clone());
        (link, transport)
    }

    fn bring_ready(link: &mut LinkManager<MockTransport>) {
        link.start();
        link.on_peer_found("ESP32_BLE", "aa:bb:cc:dd:ee:ff");
        link.on_connected();
        link.on_services_resolved(true);
    }

    fn nav_payload(json: &str) -> WirePayload {
        WirePayload {
            class: EventClass::Navigation,
            json: json.to_string(),
        }
    }

    fn call_payload(json: &str) -> WirePayload {
        WirePayload {
            class: EventClass::PhoneCall,
            json: json.to_string(),
        }
    }

    #[test]
    fn test_happy_path_to_ready() {
        let (mut link, transport) = make_link();
        bring_ready(&mut link);
        assert_eq!(link.state(), LinkState::Ready);
        assert_eq!(
            transport.take(),
            vec![
                Action::StartScan,
                Action::StopScan,
                Action::Connect("aa:bb:cc:dd:ee:ff".to_string()),
                Action::Discover,
            ]
        );
    }

    #[test]
    fn test_wrong_peer_name_ignored() {
        let (mut link, _) = make_link();
        link.start();
        link.on_peer_found("SomeOtherDevice", "11:22:33:44:55:66");
        assert_eq!(link.state(), LinkState::Scanning);
    }

    #[test]
    fn test_send_fails_when_not_ready() {
        let (mut link, _) = make_link();
        let result = link.send(nav_payload("{}"));
        assert!(matches!(result, Err(RelayError::LinkNotReady(_))));
    }

    #[test]
    fn test_send_writes_when_ready() {
        let (mut link, transport) = make_link();
        bring_ready(&mut link);
        transport.take();

        link.send(nav_payload(r#"{"n":1}"#)).expect("send");
        assert_eq!(transport.take(), vec![Action::Write(r#"{"n":1}"#.to_string())]);
    }

    #[test]
    fn test_queue_of_one_latest_wins() {
        let (mut link, transport) = make_link();
        bring_ready(&mut link);
        transport.take();

        link.send(nav_payload(r#"{"n":1}"#)).expect("send");
        // Two more arrive while the first write is still in flight
        link.send(nav_payload(r#"{"n":2}"#)).expect("send");
        link.send(nav_payload(r#"{"n":3}"#)).expect("send");
        link.on_write_complete(true);
        link.on_write_complete(true);

        assert_eq!(
            transport.take(),
            vec![
                Action::Write(r#"{"n":1}"#.to_string()),
                Action::Write(r#"{"n":3}"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_ready_resends_retained_payloads_once() {
        let (mut link, transport) = make_link();
        // Payloads arrive while the link is still down
        link.offer(nav_payload(r#"{"nav":true}"#));
        link.offer(call_payload(r#"{"call":true}"#));

        bring_ready(&mut link);
        link.on_write_complete(true);
        link.on_write_complete(true);

        let writes: Vec<Action> = transport
            .take()
            .into_iter()
            .filter(|a| matches!(a, Action::Write(_)))
            .collect();
        assert_eq!(
            writes,
            vec![
                Action::Write(r#"{"nav":true}"#.to_string()),
                Action::Write(r#"{"call":true}"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_link_loss_schedules_reconnect_and_resends_on_recovery() {
        let (mut link, transport) = make_link();
        bring_ready(&mut link);
        link.send(nav_payload(r#"{"n":1}"#)).expect("send");
        link.on_write_complete(true);
        transport.take();

        link.on_link_lost();
        assert_eq!(link.state(), LinkState::Disconnected);
        let timer = link.take_scheduled_timer().expect("reconnect timer");
        assert_eq!(timer.kind, TimerKind::Reconnect);
        assert_eq!(timer.delay, Duration::from_millis(5_000));

        link.fire_timer(TimerKind::Reconnect, timer.generation);
        assert_eq!(link.state(), LinkState::Scanning);
        link.on_peer_found("ESP32_BLE", "aa:bb:cc:dd:ee:ff");
        link.on_connected();
        link.on_services_resolved(true);
        link.on_write_complete(true);

        let writes: Vec<Action> = transport
            .take()
            .into_iter()
            .filter(|a| matches!(a, Action::Write(_)))
            .collect();
        // The retained payload goes out exactly once on recovery
        assert_eq!(writes, vec![Action::Write(r#"{"n":1}"#.to_string())]);
    }

    #[test]
    fn test_scan_timeout_falls_back_and_retries() {
        let (mut link, transport) = make_link();
        link.start();
        let timer = link.take_scheduled_timer().expect("scan timer");
        assert_eq!(timer.kind, TimerKind::ScanTimeout);
        assert_eq!(timer.delay, Duration::from_millis(10_000));

        link.fire_timer(TimerKind::ScanTimeout, timer.generation);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(transport.take().contains(&Action::StopScan));

        let timer = link.take_scheduled_timer().expect("reconnect timer");
        assert_eq!(timer.kind, TimerKind::Reconnect);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let (mut link, _) = make_link();
        link.start();
        let timer = link.take_scheduled_timer().expect("scan timer");

        // Peer found cancels the scan timer by bumping the generation
        link.on_peer_found("ESP32_BLE", "aa:bb:cc:dd:ee:ff");
        link.fire_timer(TimerKind::ScanTimeout, timer.generation);
        assert_eq!(link.state(), LinkState::Connecting);
    }

    #[test]
    fn test_explicit_disconnect_suppresses_reconnect() {
        let (mut link, _) = make_link();
        bring_ready(&mut link);
        link.disconnect();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(link.take_scheduled_timer(), None);

        // A late link-lost event must not resurrect the link either
        link.on_link_lost();
        assert_eq!(link.take_scheduled_timer(), None);
    }

    #[test]
    fn test_missing_service_stays_discovering() {
        let (mut link, _) = make_link();
        link.start();
        link.on_peer_found("ESP32_BLE", "aa:bb:cc:dd:ee:ff");
        link.on_connected();
        link.on_services_resolved(false);
        assert_eq!(link.state(), LinkState::Discovering);
        assert!(!link.is_ready());
    }

    #[test]
    fn test_status_counters() {
        let (mut link, _) = make_link();
        bring_ready(&mut link);
        link.send(nav_payload("{}")).expect("send");
        link.on_write_complete(true);
        link.send(nav_payload("{}")).expect("send");
        link.on_write_complete(false);

        let status = link.status();
        assert_eq!(status.state, "ready");
        assert_eq!(status.writes_ok, 1);
        assert_eq!(status.writes_failed, 1);
    }
}
