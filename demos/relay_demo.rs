//! Feed a few notification events through the relay against an in-memory link

use std::sync::{Arc, Mutex};

use ridelink::config::RelayConfig;
use ridelink::link::Transport;
use ridelink::relay::Relay;
use ridelink::types::FeedEvent;

#[derive(Clone, Default)]
struct PrintTransport {
    writes: Arc<Mutex<u32>>,
}

impl Transport for PrintTransport {
    fn start_scan(&mut self) {}
    fn stop_scan(&mut self) {}
    fn connect(&mut self, _address: &str) {}
    fn discover_services(&mut self) {}
    fn write(&mut self, bytes: &[u8]) {
        let mut count = self.writes.lock().unwrap();
        *count += 1;
        println!("write {}: {}", count, String::from_utf8_lossy(bytes));
    }
    fn disconnect(&mut self) {}
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let relay = match Relay::new(RelayConfig::default(), PrintTransport::default()) {
        Ok(relay) => relay,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return;
        }
    };

    relay.start();
    relay.on_peer_found("ESP32_BLE", "aa:bb:cc:dd:ee:ff");
    relay.on_connected();
    relay.on_services_resolved(true);

    let events = r#"
        {"source": "com.google.android.apps.maps", "title": "Google Maps", "text": "Turn left in 200m onto Main Street"}
        {"source": "com.android.dialer", "title": "Alice", "text": "Incoming call"}
        {"source": "com.android.dialer", "title": "Alice", "text": "Incoming call", "removed": true}
        {"source": "com.whatsapp", "title": "Bob", "text": "see you at the cafe"}
    "#;

    for line in events.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<FeedEvent>(line) {
            Ok(event) => {
                relay.handle(&event);
                relay.on_write_complete(true);
            }
            Err(e) => eprintln!("Error: {e:?}"),
        }
    }
}
