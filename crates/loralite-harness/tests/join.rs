//! Join handshake scenarios over the in-process link.

use std::time::Duration;

use loralite_crypto::encrypt_block;
use loralite_device::DeviceError;
use loralite_gateway::GatewayEvent;
use loralite_harness::{device_eui, Rig, ScriptedRng};

/// Gateway RNG script pinning `joinNonce = AA BB CC` and
/// `devAddr = 0x11223344`.
fn pinned_gateway_rng() -> ScriptedRng {
    ScriptedRng::new(&[0x00CC_BBAA, 0x1122_3344])
}

#[test]
fn join_derives_matching_sessions() {
    let mut rig = Rig::start(pinned_gateway_rng());

    // Device nonce pinned to 0x5678.
    let mut device_rng = ScriptedRng::new(&[0x5678]);
    rig.device.join(&mut device_rng).expect("join should succeed");
    assert!(rig.device.is_joined());

    let device_session = rig.device.session().expect("session stored");
    assert_eq!(device_session.dev_addr, 0x1122_3344);
    assert_eq!(device_session.join_nonce, [0xAA, 0xBB, 0xCC]);
    assert_eq!(device_session.net_id, [0x01, 0x23, 0x45]);
    assert_eq!(device_session.dev_nonce, 0x5678);

    // appSKey = AES(appKey, [0x02, joinNonce, netID, devNonce LE, 0 x 7])
    let mut input = [0u8; 16];
    input[0] = 0x02;
    input[1..4].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
    input[4..7].copy_from_slice(&[0x01, 0x23, 0x45]);
    input[7..9].copy_from_slice(&0x5678u16.to_le_bytes());
    assert_eq!(device_session.app_s_key, encrypt_block(&[0u8; 16], &input));

    let (_, mut gateway, _, northbound) = rig.shutdown();

    // Gateway derived the identical session, keyed by the DevEUI hex.
    let gateway_session = gateway.session(&device_eui()).expect("gateway session");
    assert_eq!(gateway_session, device_session);

    assert!(northbound
        .snapshot()
        .iter()
        .any(|e| matches!(e, GatewayEvent::Joined { dev_addr: 0x1122_3344, .. })));
}

#[test]
fn join_is_idempotent_with_no_transmission() {
    let mut rig = Rig::start(pinned_gateway_rng());

    let mut device_rng = ScriptedRng::new(&[0x5678]);
    rig.device.join(&mut device_rng).expect("first join");
    let transmissions = rig.monitor.device_transmissions();

    // A second join must not touch the air.
    rig.device.join(&mut device_rng).expect("idempotent join");
    assert_eq!(rig.monitor.device_transmissions(), transmissions);
}

#[test]
fn duplicate_join_after_flush_is_refused_by_gateway() {
    let mut rig = Rig::start(pinned_gateway_rng());

    let mut device_rng = ScriptedRng::new(&[0x5678]);
    rig.device.join(&mut device_rng).expect("first join");
    let accepts_sent = rig.monitor.gateway_transmissions();

    // The device forgets its session; the gateway does not. The repeat
    // join gets no accept and the device ends where it started.
    rig.device.flush_session();
    let err = rig.device.join(&mut device_rng).expect_err("gateway must refuse");
    assert_eq!(err, DeviceError::JoinFailed { attempts: 2 });

    let (_, mut gateway, monitor, _) = rig.shutdown();
    assert_eq!(monitor.gateway_transmissions(), accepts_sent, "no second accept on the air");

    let session = gateway.session(&device_eui()).expect("original session intact");
    assert_eq!(session.dev_nonce, 0x5678);
    assert_eq!(session.dev_addr, 0x1122_3344);
}

#[test]
fn join_fails_cleanly_without_a_gateway() {
    // Rig whose gateway never answers: drop every frame headed its way by
    // stopping the gateway thread first.
    let rig = Rig::start(ScriptedRng::new(&[]));
    let (mut device, _gateway, _monitor, _) = rig.shutdown();

    let mut device_rng = ScriptedRng::new(&[0x0001]);
    let err = device.join(&mut device_rng).expect_err("nobody answers");
    assert_eq!(err, DeviceError::JoinFailed { attempts: 2 });
    assert!(!device.is_joined());
}

#[test]
fn gateway_reports_join_northbound() {
    let mut rig = Rig::start(pinned_gateway_rng());

    let mut device_rng = ScriptedRng::new(&[0x5678]);
    rig.device.join(&mut device_rng).expect("join");

    let reported = rig.wait_for_events(Duration::from_secs(1), |events| {
        events
            .iter()
            .any(|e| matches!(e, GatewayEvent::Joined { dev_eui, .. } if *dev_eui == device_eui()))
    });
    assert!(reported, "Joined event never published");
}
