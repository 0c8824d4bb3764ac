//! End-to-end tests: requests in through the broker, device exchange over a
//! scripted transport, events back out.

use std::time::Duration;

use approx::assert_relative_eq;
use fancontrol_bridge::config::PollerConfig;
use fancontrol_bridge::*;
use fancontrol_bus::{Event, StopSignal, Subscription};
use fancontrol_protocol::testing::ScriptedTransport;
use fancontrol_protocol::{ACK, CMD_GET_STATUS, ERROR, HELLO, RCVD};
use serde_json::{json, Value};

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.communicator.tick_ms = 1;
    config.broker.idle_ms = 5;
    config
}

fn wait_for(sub: &Subscription, name: &str) -> Option<Event> {
    while let Some(event) = sub.fetch_timeout(WAIT) {
        if event.name == name {
            return Some((*event).clone());
        }
    }
    None
}

fn request(data: Value) -> Event {
    Event::new("controller_command", data)
}

#[test]
fn test_get_status_round_trip() {
    let script = ScriptedTransport::new()
        .reply_u8(ACK)
        .reply_biased(300)
        .reply_biased(315)
        .reply_biased(7500)
        .reply_biased(42);
    let stop = StopSignal::new();
    let bridge = launch(&fast_config(), script.clone(), stop).unwrap();
    let observer = bridge.handle().new_subscriber();

    let req = json!({"command": "GET_STATUS", "channel": 1});
    bridge.handle().publisher().publish(request(req.clone())).unwrap();

    let status = wait_for(&observer, "controller_status").expect("no status event");
    assert_eq!(status.data["channel"], json!(1));
    assert_relative_eq!(status.data["temp"].as_f64().unwrap(), 30.0);
    assert_relative_eq!(status.data["target"].as_f64().unwrap(), 31.5);
    assert_eq!(status.data["speed"], json!(7500));
    assert_eq!(status.data["output"], json!(42));

    let outcome = wait_for(&observer, EVENT_COMMAND_RESULTS).expect("no outcome event");
    assert_eq!(outcome.data["type"], json!("success"));
    assert_eq!(outcome.data["original_command"], req);

    bridge.stop();
    bridge.join().unwrap();
    assert_eq!(
        script.writes(),
        vec![vec![HELLO], vec![CMD_GET_STATUS], vec![1], vec![RCVD]]
    );
}

#[test]
fn test_settings_arrive_as_string_payload() {
    let script = ScriptedTransport::new()
        .reply_u8(ACK)
        .reply_u16(2)
        .reply_u16(315)
        .reply_u16(7500)
        .reply_u16(42);
    let bridge = launch(&fast_config(), script, StopSignal::new()).unwrap();
    let observer = bridge.handle().new_subscriber();

    bridge
        .handle()
        .publisher()
        .publish(request(json!(r#"{"command": "GET_SETTINGS", "channel": 0}"#)))
        .unwrap();

    let settings = wait_for(&observer, "controller_settings").expect("no settings event");
    assert_eq!(settings.data["mode"], json!(2));
    assert_relative_eq!(settings.data["kp"].as_f64().unwrap(), 3.15);
    assert_relative_eq!(settings.data["ki"].as_f64().unwrap(), 75.0);
    assert_relative_eq!(settings.data["kd"].as_f64().unwrap(), 0.42);

    bridge.stop();
    bridge.join().unwrap();
}

#[test]
fn test_silent_device_gives_one_error_outcome() {
    let script = ScriptedTransport::new();
    let bridge = launch(&fast_config(), script.clone(), StopSignal::new()).unwrap();
    let observer = bridge.handle().new_subscriber();

    let req = json!({"command": "SET_TARGET", "channel": 0, "value": 22.5});
    bridge.handle().publisher().publish(request(req.clone())).unwrap();

    let outcome = wait_for(&observer, EVENT_COMMAND_RESULTS).expect("no outcome event");
    assert_eq!(outcome.data["type"], json!("error"));
    assert_eq!(outcome.data["original_command"], req);
    assert!(outcome.data["message"].as_str().unwrap().contains("timeout"));

    bridge.stop();
    bridge.join().unwrap();
    assert_eq!(script.write_count(), 3);
    assert_eq!(script.read_count(), 3);
    assert!(observer.drain().iter().all(|e| e.name != EVENT_COMMAND_RESULTS));
}

#[test]
fn test_bad_requests_do_not_stop_the_unit() {
    let script = ScriptedTransport::new().reply_u8(ACK).reply_u8(RCVD);
    let bridge = launch(&fast_config(), script.clone(), StopSignal::new()).unwrap();
    let observer = bridge.handle().new_subscriber();
    let publisher = bridge.handle().publisher();

    publisher.publish(request(json!("not json"))).unwrap();
    publisher.publish(request(json!({"command": "EXPLODE", "channel": 0}))).unwrap();
    publisher.publish(request(json!({"command": "SET_OUTPUT", "channel": 0, "value": 999}))).unwrap();
    publisher
        .publish(request(json!({"command": "SET_OUTPUT", "channel": 0, "value": 128})))
        .unwrap();

    let outcome = wait_for(&observer, EVENT_COMMAND_RESULTS).expect("no outcome event");
    assert_eq!(outcome.data["type"], json!("success"));
    assert_eq!(outcome.data["original_command"]["value"], json!(128));

    bridge.stop();
    bridge.join().unwrap();
    assert_eq!(script.writes()[3], vec![128]);
}

#[test]
fn test_retry_recovers_after_device_error() {
    let script = ScriptedTransport::new()
        .reply_u8(ERROR)
        .reply_u8(ACK)
        .reply_u8(RCVD);
    let bridge = launch(&fast_config(), script.clone(), StopSignal::new()).unwrap();
    let observer = bridge.handle().new_subscriber();

    bridge
        .handle()
        .publisher()
        .publish(request(json!({"command": "SET_KP", "channel": 2, "value": 1.25})))
        .unwrap();

    let outcome = wait_for(&observer, EVENT_COMMAND_RESULTS).expect("no outcome event");
    assert_eq!(outcome.data["type"], json!("success"));

    bridge.stop();
    bridge.join().unwrap();
    assert_eq!(script.write_count(), 5);
    assert_eq!(script.reset_count(), 2);
}

#[test]
fn test_poller_requests_status() {
    let script = ScriptedTransport::new()
        .reply_u8(ACK)
        .reply_biased(215)
        .reply_biased(220)
        .reply_biased(1200)
        .reply_biased(90);
    let mut config = fast_config();
    config.poller = Some(PollerConfig {
        interval_secs: 0.01,
        channels: vec![4],
        ..PollerConfig::default()
    });
    let bridge = launch(&config, script, StopSignal::new()).unwrap();
    assert_eq!(bridge.unit_names(), vec!["communicator", "poller"]);
    let observer = bridge.handle().new_subscriber();

    let status = wait_for(&observer, "controller_status").expect("no status event");
    assert_eq!(status.data["channel"], json!(4));
    assert_relative_eq!(status.data["temp"].as_f64().unwrap(), 21.5);

    bridge.stop();
    bridge.join().unwrap();
}
