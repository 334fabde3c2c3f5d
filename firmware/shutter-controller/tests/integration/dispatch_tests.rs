//! Command handler behaviour through the datagram dispatcher.

use shutter_controller::config::{
    Calibration, NetworkIdentity, CALIBRATION_OFFSET, DEFAULT_SERVO_PIN, NETWORK_OFFSET,
};
use shutter_controller::provisioning::BootOutcome;
use shutter_controller::store::{MemStore, RecordStore};
use shutter_controller::{Flow, Shutter, StoreError};
use shutter_protocol::{Command, OscArg, ShutterStatus};
use std::net::Ipv4Addr;

use crate::mock_hw::*;

fn send(shutter: &mut TestShutter, datagram: Vec<u8>) -> shutter_controller::Outcome {
    shutter.dispatch(&datagram).unwrap()
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_attaches_and_swings() {
    let shutter = fresh_shutter(1);
    let cal = Calibration::factory();
    assert_eq!(
        shutter.actuator().calls,
        vec![
            ServoCall::Attach(cal.pin),
            ServoCall::Move(cal.open),
            ServoCall::Move(cal.closed),
            ServoCall::Move(cal.open),
        ]
    );
    assert_eq!(shutter.current_angle(), cal.open);
    assert_eq!(shutter.status(), ShutterStatus::Open);
}

// ── Motion ────────────────────────────────────────────────────

#[test]
fn open_is_idempotent() {
    let mut shutter = fresh_shutter(1);
    let before = shutter.actuator().moves().len();

    let out = send(&mut shutter, packet(Command::Open));
    assert_eq!(out.flow, Flow::Continue);
    assert!(out.reply.is_none());
    assert_eq!(shutter.actuator().moves().len(), before);
    assert_eq!(shutter.current_angle(), 135);
}

#[test]
fn close_then_open() {
    let mut shutter = fresh_shutter(1);
    let before = shutter.actuator().moves().len();

    send(&mut shutter, packet(Command::Close));
    assert_eq!(shutter.current_angle(), 45);
    assert_eq!(shutter.status(), ShutterStatus::Closed);

    // Second close does not move again
    send(&mut shutter, packet(Command::Close));
    send(&mut shutter, packet(Command::Open));
    assert_eq!(shutter.current_angle(), 135);
    assert_eq!(&shutter.actuator().moves()[before..], &[45, 135]);
}

#[test]
fn move_sets_angle() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::Move(90)));
    assert_eq!(shutter.current_angle(), 90);
    assert_eq!(shutter.status(), ShutterStatus::Intermediate);
    assert_eq!(shutter.actuator().moves().last(), Some(&90));
}

#[test]
fn move_out_of_range_is_ignored() {
    let mut shutter = fresh_shutter(1);
    let calls = shutter.actuator().calls.len();

    send(&mut shutter, raw("/move", &[OscArg::Int(181)]));
    send(&mut shutter, raw("/move", &[OscArg::Int(-5)]));
    send(&mut shutter, raw("/move", &[]));
    send(&mut shutter, raw("/move", &[OscArg::string("ninety").unwrap()]));

    assert_eq!(shutter.current_angle(), 135);
    assert_eq!(shutter.actuator().calls.len(), calls);
}

#[test]
fn move_float_truncates() {
    let mut a = fresh_shutter(1);
    let mut b = fresh_shutter(1);
    send(&mut a, raw("/move", &[OscArg::Float(91.7)]));
    send(&mut b, raw("/move", &[OscArg::Int(91)]));
    assert_eq!(a.current_angle(), 91);
    assert_eq!(a.current_angle(), b.current_angle());
    assert_eq!(a.actuator().calls, b.actuator().calls);
}

#[test]
fn self_test_returns_to_open() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::Move(10)));
    let before = shutter.actuator().moves().len();

    let out = send(&mut shutter, packet(Command::Test));
    assert_eq!(out.flow, Flow::Continue);
    assert_eq!(&shutter.actuator().moves()[before..], &[135, 45, 135]);
    assert_eq!(shutter.current_angle(), 135);
}

#[test]
fn stalled_servo_keeps_position() {
    let mut store = RecordStore::new(MemStore::default());
    boot(&mut store, 1);
    let config = match boot(&mut store, 1) {
        BootOutcome::Ready(c) => c,
        other => panic!("unexpected {:?}", other),
    };
    // The three self-test moves succeed, everything after fails
    let mut shutter =
        Shutter::start(store, config, MockServo::failing_after(3), NoDelay::default()).unwrap();

    let out = send(&mut shutter, packet(Command::Move(90)));
    assert_eq!(out.flow, Flow::Continue);
    assert_eq!(shutter.current_angle(), 135);

    send(&mut shutter, packet(Command::Close));
    assert_eq!(shutter.current_angle(), 135);
    assert_eq!(shutter.status(), ShutterStatus::Open);
}

#[test]
fn failed_self_test_aborts_start() {
    let mut store = RecordStore::new(MemStore::default());
    boot(&mut store, 1);
    let config = match boot(&mut store, 1) {
        BootOutcome::Ready(c) => c,
        other => panic!("unexpected {:?}", other),
    };
    let result = Shutter::start(store, config, MockServo::failing_after(0), NoDelay::default());
    assert!(matches!(result, Err("stalled")));
}

#[test]
fn interrupted_self_test_tracks_last_move() {
    let mut store = RecordStore::new(MemStore::default());
    boot(&mut store, 1);
    let config = match boot(&mut store, 1) {
        BootOutcome::Ready(c) => c,
        other => panic!("unexpected {:?}", other),
    };
    // Start swing (3) and the move to 10 succeed, then only the first
    // self-test move gets through
    let mut shutter =
        Shutter::start(store, config, MockServo::failing_after(5), NoDelay::default()).unwrap();
    send(&mut shutter, packet(Command::Move(10)));
    assert_eq!(shutter.current_angle(), 10);

    send(&mut shutter, packet(Command::Test));
    assert_eq!(shutter.actuator().moves().last(), Some(&135));
    assert_eq!(shutter.current_angle(), 135);

    let reply = send(&mut shutter, packet(Command::Position)).reply.unwrap();
    assert_eq!(reply.int(0), Some(135));
}

// ── Replies ───────────────────────────────────────────────────

#[test]
fn position_replies_current_angle() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::Move(77)));

    let out = send(&mut shutter, packet(Command::Position));
    let reply = out.reply.expect("position reply");
    assert_eq!(reply.address(), "/position");
    assert_eq!(reply.int(0), Some(77));
}

#[test]
fn ping_always_pongs() {
    let mut shutter = fresh_shutter(1);
    for cmd in [Command::Move(3), Command::Close, Command::Open] {
        send(&mut shutter, packet(cmd));
        let out = send(&mut shutter, packet(Command::Ping));
        let reply = out.reply.expect("pong");
        assert_eq!(reply.address(), "/pong");
        assert!(reply.args().is_empty());
        assert_eq!(out.flow, Flow::Continue);
    }
}

// ── Calibration ───────────────────────────────────────────────

#[test]
fn set_open_survives_restart() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::Move(100)));
    let out = send(&mut shutter, packet(Command::SetOpen));
    assert_eq!(out.flow, Flow::Continue);
    assert_eq!(shutter.calibration().open, 100);

    let (outcome, _) = restart(shutter, 9);
    match outcome {
        BootOutcome::Ready(config) => {
            assert_eq!(config.calibration.open, 100);
            assert_eq!(config.calibration.closed, 45);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn set_closed_persists_and_reorders_freely() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::Move(170)));
    send(&mut shutter, packet(Command::SetClosed));

    // Closed is now numerically larger than open; no ordering is enforced
    let stored: Calibration = shutter.store().read_record(CALIBRATION_OFFSET).unwrap();
    assert_eq!(stored.closed, 170);
    assert_eq!(stored.open, 135);
    assert_eq!(shutter.status(), ShutterStatus::Closed);
}

#[test]
fn servo_pin_persists_without_restart() {
    let mut shutter = fresh_shutter(1);
    let out = send(&mut shutter, packet(Command::ServoPin(13)));
    assert_eq!(out.flow, Flow::Continue);

    let stored: Calibration = shutter.store().read_record(CALIBRATION_OFFSET).unwrap();
    assert_eq!(stored.pin, 13);
}

#[test]
fn servo_pin_out_of_range_is_ignored() {
    let mut shutter = fresh_shutter(1);
    let writes = write_count(&shutter);
    send(&mut shutter, raw("/servo_pin", &[OscArg::Int(1)]));
    send(&mut shutter, raw("/servo_pin", &[OscArg::Int(27)]));
    assert_eq!(write_count(&shutter), writes);
    assert_eq!(shutter.calibration().pin, DEFAULT_SERVO_PIN);
}

#[test]
fn set_closed_survives_restart() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::Move(20)));
    send(&mut shutter, packet(Command::SetClosed));

    let (outcome, _) = restart(shutter, 4);
    match outcome {
        BootOutcome::Ready(config) => {
            assert_eq!(config.calibration.closed, 20);
            assert_eq!(config.calibration.open, 135);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn servo_pin_rejects_reserved_gpio() {
    let mut shutter = fresh_shutter(1);
    let writes = write_count(&shutter);

    // Flash and Ethernet pins inside the wire range
    for pin in [6, 9, 11, 12, 17, 21, 26] {
        let out = send(&mut shutter, packet(Command::ServoPin(pin)));
        assert_eq!(out.flow, Flow::Continue);
    }
    assert_eq!(write_count(&shutter), writes);
    assert_eq!(shutter.calibration().pin, DEFAULT_SERVO_PIN);

    let (_, store) = restart(shutter, 1);
    let shutter = start(store);
    assert_eq!(
        shutter.actuator().calls.first(),
        Some(&ServoCall::Attach(DEFAULT_SERVO_PIN))
    );
}

#[test]
fn reserved_stored_pin_falls_back_to_default() {
    let mut store = RecordStore::new(MemStore::default());
    boot(&mut store, 1);
    let mut cal: Calibration = store.read_record(CALIBRATION_OFFSET).unwrap();
    cal.pin = 21;
    store.write_record(CALIBRATION_OFFSET, &cal).unwrap();

    let shutter = start(store);
    assert_eq!(
        shutter.actuator().calls.first(),
        Some(&ServoCall::Attach(DEFAULT_SERVO_PIN))
    );
    assert_eq!(shutter.calibration().pin, DEFAULT_SERVO_PIN);
}

// ── Network identity ──────────────────────────────────────────

#[test]
fn shutter_ip_persists_and_restarts() {
    let mut shutter = fresh_shutter(1);
    let out = send(&mut shutter, packet(Command::ShutterIp(12)));
    assert_eq!(out.flow, Flow::Restart);

    let stored: NetworkIdentity = shutter.store().read_record(NETWORK_OFFSET).unwrap();
    assert_eq!(stored.shutter_ip, Ipv4Addr::new(192, 168, 0, 12));
}

#[test]
fn shutter_ip_rejects_bad_input() {
    let mut shutter = fresh_shutter(1);
    let writes = write_count(&shutter);
    for args in [
        vec![OscArg::Int(256)],
        vec![OscArg::Int(-1)],
        vec![OscArg::Float(12.0)],
        vec![],
    ] {
        let out = send(&mut shutter, raw("/shutter_ip", &args));
        assert_eq!(out.flow, Flow::Continue);
    }
    assert_eq!(write_count(&shutter), writes);
    assert_eq!(shutter.network().shutter_ip, Ipv4Addr::new(192, 168, 0, 99));
}

#[test]
fn master_ip_changes_reply_target() {
    let mut shutter = fresh_shutter(1);
    let out = send(&mut shutter, packet(Command::MasterIp(77)));
    assert_eq!(out.flow, Flow::Continue);
    assert_eq!(shutter.master_addr().to_string(), "192.168.0.77:9000");

    let stored: NetworkIdentity = shutter.store().read_record(NETWORK_OFFSET).unwrap();
    assert_eq!(stored.master_ip, Ipv4Addr::new(192, 168, 0, 77));
}

#[test]
fn ports_persist() {
    let mut shutter = fresh_shutter(1);
    let out = send(&mut shutter, packet(Command::MasterPort(9100)));
    assert_eq!(out.flow, Flow::Continue);
    assert_eq!(shutter.master_addr().port(), 9100);

    let out = send(&mut shutter, packet(Command::ShutterPort(8100)));
    assert_eq!(out.flow, Flow::Restart);

    let (outcome, _) = restart(shutter, 0);
    match outcome {
        BootOutcome::Ready(config) => {
            assert_eq!(config.network.shutter_port, 8100);
            assert_eq!(config.network.master_port, 9100);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn master_ip_rejects_bad_input() {
    let mut shutter = fresh_shutter(1);
    let writes = write_count(&shutter);
    let before = shutter.master_addr();
    for args in [
        vec![OscArg::Int(-1)],
        vec![OscArg::Int(256)],
        vec![OscArg::Float(50.0)],
        vec![],
    ] {
        let out = send(&mut shutter, raw("/master_ip", &args));
        assert_eq!(out.flow, Flow::Continue);
    }
    assert_eq!(write_count(&shutter), writes);
    assert_eq!(shutter.master_addr(), before);
}

#[test]
fn master_port_rejects_bad_input() {
    let mut shutter = fresh_shutter(1);
    let writes = write_count(&shutter);
    let before = shutter.master_addr();
    for args in [
        vec![OscArg::Int(-1)],
        vec![OscArg::Int(65536)],
        vec![OscArg::Float(9100.0)],
        vec![],
    ] {
        let out = send(&mut shutter, raw("/master_port", &args));
        assert_eq!(out.flow, Flow::Continue);
    }
    assert_eq!(write_count(&shutter), writes);
    assert_eq!(shutter.master_addr(), before);
}

// ── Restart commands ──────────────────────────────────────────

#[test]
fn reboot_restarts_without_writing() {
    let mut shutter = fresh_shutter(1);
    let writes = write_count(&shutter);
    let out = send(&mut shutter, packet(Command::Reboot));
    assert_eq!(out.flow, Flow::Restart);
    assert!(out.reply.is_none());
    assert_eq!(write_count(&shutter), writes);
}

#[test]
fn reset_config_reprovisions_on_next_boot() {
    let mut shutter = fresh_shutter(1);
    send(&mut shutter, packet(Command::MasterIp(5)));
    send(&mut shutter, packet(Command::Move(60)));
    send(&mut shutter, packet(Command::SetOpen));

    let out = send(&mut shutter, packet(Command::ResetConfig));
    assert_eq!(out.flow, Flow::Restart);

    let (outcome, mut store) = restart(shutter, 2);
    assert_eq!(outcome, BootOutcome::Provisioned);

    match boot(&mut store, 0) {
        BootOutcome::Ready(config) => {
            assert_eq!(config.calibration, Calibration::factory());
            assert_eq!(config.network.master_ip, Ipv4Addr::new(192, 168, 0, 40));
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ── Best-effort input handling ────────────────────────────────

#[test]
fn unknown_and_malformed_input_is_ignored() {
    let mut shutter = fresh_shutter(1);
    let calls = shutter.actuator().calls.len();
    let writes = write_count(&shutter);

    for datagram in [
        raw("/dance", &[OscArg::Int(1)]),
        raw("/open/now", &[]),
        b"garbage".to_vec(),
        Vec::new(),
        b"#bundle\0\0\0\0\0\0\0\0\x01".to_vec(),
    ] {
        let out = send(&mut shutter, datagram);
        assert_eq!(out.flow, Flow::Continue);
        assert!(out.reply.is_none());
    }

    assert_eq!(shutter.actuator().calls.len(), calls);
    assert_eq!(write_count(&shutter), writes);
}

#[test]
fn store_failure_surfaces() {
    let mut store = RecordStore::new(MemStore::default());
    boot(&mut store, 1);
    let config = match boot(&mut store, 1) {
        BootOutcome::Ready(c) => c,
        other => panic!("unexpected {:?}", other),
    };

    // A store too small for the calibration record
    let tiny = RecordStore::new(MemStore::new(8));
    let mut shutter = Shutter::start(tiny, config, MockServo::default(), NoDelay::default()).unwrap();
    let err = shutter.dispatch(&packet(Command::SetOpen)).unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { offset: 21, .. }));
}
