//! Integration tests for the wired drivers against the mock transport.
//!
//! These drive the full acquisition path (attach, identify, stream) the
//! way the embedding application does, and pin down the retry pacing and
//! lifecycle guarantees with paused virtual time.

use spiro_core::{HealthState, SensorError};
use spiro_drivers::{Co2Probe, Co2ProbeConfig, FlowMeter, FlowMeterConfig};
use spiro_link::{AnySensorLink, MockLink, MockLinkHandle};
use std::time::Duration;

async fn attached_probe() -> (Co2Probe, MockLinkHandle) {
    let probe = Co2Probe::new(Co2ProbeConfig::default()).unwrap();
    let (link, handle) = MockLink::new();
    handle
        .push_line("Device : GMP343 SNUM : R3234317 SW : 605")
        .unwrap();
    probe.attach_link(AnySensorLink::Mock(link)).await.unwrap();
    (probe, handle)
}

#[tokio::test]
async fn co2_stream_delivers_parsed_measurements() {
    let (probe, handle) = attached_probe().await;
    let mut stream = probe.start();

    handle.push_line("CO2=  412.35 ppm").unwrap();
    assert_eq!(stream.recv().await, Some(412.35));

    handle.push_line("CO2=  413.10 ppm").unwrap();
    assert_eq!(stream.recv().await, Some(413.10));

    let health = stream.health();
    assert_eq!(health.state, HealthState::Healthy);
    assert_eq!(health.consecutive_failures, 0);

    stream.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn co2_stream_retries_after_fixed_interval() {
    let (probe, handle) = attached_probe().await;
    let mut stream = probe.start();
    let start = tokio::time::Instant::now();

    // First transaction fails; the loop must wait exactly the one-second
    // retry interval before issuing the identical request again.
    handle
        .push_error(SensorError::connection("device unplugged"))
        .unwrap();
    handle.push_line("CO2=  409.80 ppm").unwrap();

    assert_eq!(stream.recv().await, Some(409.80));
    assert!(start.elapsed() >= Duration::from_secs(1));

    // Both attempts wrote the same request token.
    let commands = handle.commands();
    assert_eq!(&commands[commands.len() - 2..], &["send", "send"]);

    // The failure was visible while it lasted, and recovery reset the
    // counter but kept the last error inspectable.
    let health = stream.health();
    assert_eq!(health.state, HealthState::Healthy);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(
        health.last_error.as_deref(),
        Some("Connection error: device unplugged")
    );

    stream.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn dead_sensor_degrades_health_but_keeps_retrying() {
    let (probe, handle) = attached_probe().await;
    let stream = probe.start();
    let commands_before = handle.command_count();

    for _ in 0..5 {
        handle
            .push_error(SensorError::timeout(5000))
            .unwrap();
    }
    tokio::time::sleep(Duration::from_secs(6)).await;

    let health = stream.health();
    assert_eq!(health.state, HealthState::Degraded);
    assert!(health.consecutive_failures >= 5);
    // Five failed transactions means five identical retries on the wire.
    assert!(handle.command_count() >= commands_before + 5);

    stream.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn flow_stream_with_override_needs_no_hardware() {
    let config = FlowMeterConfig::default().with_constant_flow(42.5);
    let meter = FlowMeter::new(config).unwrap();

    // Never connected: the stream still produces the override value.
    let mut stream = meter.start();
    assert_eq!(stream.recv().await, Some(42.5));
    assert_eq!(stream.recv().await, Some(42.5));
    assert_eq!(stream.health().state, HealthState::Healthy);

    stream.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn flow_stream_reads_fourth_field() {
    let meter = FlowMeter::new(FlowMeterConfig::default()).unwrap();
    let (link, handle) = MockLink::new();
    handle
        .push_line("Device:454FTB SNUM:119552 SW version: 2.1.0")
        .unwrap();
    meter.attach_link(AnySensorLink::Mock(link)).await.unwrap();

    let mut stream = meter.start();
    handle.push_line("01 72.41 0.00 14.20 SCFM").unwrap();
    assert_eq!(stream.recv().await, Some(14.20));

    stream.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn stop_terminates_a_blocked_poller_within_bound() {
    let (probe, _handle) = attached_probe().await;
    let stream = probe.start();

    // No reply is ever scripted: the poller is parked inside its read
    // transaction. Stop must still return within the bound.
    tokio::time::timeout(Duration::from_secs(2), stream.stop(Duration::from_secs(1)))
        .await
        .expect("stop did not return")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn reconnect_keeps_streaming_on_the_new_session() {
    let (probe, first_handle) = attached_probe().await;

    let mut stream = probe.start();
    first_handle.push_line("CO2=  410.00 ppm").unwrap();
    assert_eq!(stream.recv().await, Some(410.00));

    // The device vanishes: the in-flight transaction fails, which releases
    // the session lock for the reconnect.
    first_handle
        .push_error(SensorError::connection("device unplugged"))
        .unwrap();

    // Attach a fresh link. The running poller picks up the replacement
    // session on its next transaction.
    let (link, second_handle) = MockLink::new();
    second_handle
        .push_line("Device : GMP343 SNUM : R3234317 SW : 605")
        .unwrap();
    probe.attach_link(AnySensorLink::Mock(link)).await.unwrap();

    second_handle.push_line("CO2=  415.00 ppm").unwrap();
    assert_eq!(stream.recv().await, Some(415.00));

    stream.stop(Duration::from_secs(1)).await.unwrap();
}
