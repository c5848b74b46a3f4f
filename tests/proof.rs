//! Proof integrity and signature binding.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use xlens::crypto::{sha256_hex, KeyStore};
use xlens::domain::capture::serialize_samples;
use xlens::domain::{CaptureResult, IMUSample, Session};
use xlens::proof::{verify_hashes_locally, ProofBuilder};

fn session(nonce: &str) -> Session {
    Session {
        id: "sess_1".into(),
        nonce: nonce.into(),
        nonce_display: "A7B3X9".into(),
        expires_at: Utc::now() + Duration::seconds(900),
        device_key_id: "deadbeefdeadbeef".into(),
    }
}

fn sample(ts: i64, ay: f64) -> IMUSample {
    IMUSample {
        timestamp: ts,
        acceleration_x: 0.05,
        acceleration_y: ay,
        acceleration_z: -0.02,
        rotation_alpha: Some(0.3),
        rotation_beta: Some(-0.1),
        rotation_gamma: None,
    }
}

fn capture() -> CaptureResult {
    let video_data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let sensor_data = vec![sample(1000, -9.81), sample(1010, 8.2), sample(1020, -9.79)];
    CaptureResult {
        video_hash: sha256_hex(&video_data),
        sensor_hash: sha256_hex(&serialize_samples(&sensor_data).unwrap()),
        video_data,
        sensor_data,
        started_at_ms: 1000,
        ended_at_ms: 3000,
        fps: 58.9,
        frame_count: 118,
    }
}

#[test]
fn proof_survives_local_verification_untampered() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open(dir.path()).unwrap();
    let builder = ProofBuilder::new(&store, "user-1");

    let capture = capture();
    let proof = builder.build(&session("N1"), &capture, true).unwrap();

    assert_eq!(proof.hashes.video_sha256, capture.video_hash);
    assert_eq!(proof.hashes.sensor_sha256, capture.sensor_hash);
    assert!(verify_hashes_locally(&proof, &capture));
}

#[test]
fn single_byte_video_mutation_fails_verification() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open(dir.path()).unwrap();
    let builder = ProofBuilder::new(&store, "user-1");

    let capture = capture();
    let proof = builder.build(&session("N1"), &capture, true).unwrap();

    for index in [0, 1024, 4095] {
        let mut tampered = capture.clone();
        tampered.video_data[index] ^= 0x01;
        assert!(
            !verify_hashes_locally(&proof, &tampered),
            "mutation at byte {} went undetected",
            index
        );
    }
}

#[test]
fn sensor_mutation_fails_verification() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open(dir.path()).unwrap();
    let builder = ProofBuilder::new(&store, "user-1");

    let capture = capture();
    let proof = builder.build(&session("N1"), &capture, true).unwrap();

    let mut tampered = capture.clone();
    tampered.sensor_data[1].acceleration_y += 0.0001;
    assert!(!verify_hashes_locally(&proof, &tampered));
}

#[test]
fn nonce_is_part_of_the_signed_payload() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open(dir.path()).unwrap();
    let builder = ProofBuilder::new(&store, "user-1");

    // Identical capture bytes, two different nonces
    let capture = capture();
    let first = builder.build(&session("N1"), &capture, true).unwrap();
    let second = builder.build(&session("N2"), &capture, true).unwrap();

    assert_eq!(first.hashes.video_sha256, second.hashes.video_sha256);
    assert_ne!(first.signature.sig, second.signature.sig);
}

#[test]
fn proof_wire_shape_is_field_exact() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open(dir.path()).unwrap();
    let builder = ProofBuilder::new(&store, "user-1");

    let proof = builder.build(&session("N1"), &capture(), false).unwrap();
    let json = serde_json::to_value(&proof).unwrap();

    assert_eq!(json["capture"]["testType"], "VERT_JUMP");
    assert_eq!(json["signature"]["alg"], "ES256");
    assert_eq!(json["sensorsAvailable"], false);
    assert_eq!(json["hashes"]["videoSha256"].as_str().unwrap().len(), 64);
    assert_eq!(json["hashes"]["sensorSha256"].as_str().unwrap().len(), 64);
    assert_eq!(json["hashes"]["metadataSha256"].as_str().unwrap().len(), 64);
    // keyId is the truncated public key hash
    assert_eq!(json["signature"]["keyId"].as_str().unwrap().len(), 16);
}

#[test]
fn key_is_durable_across_store_reopen() {
    let dir = TempDir::new().unwrap();

    let first = {
        let store = KeyStore::open(dir.path()).unwrap();
        store.get_or_create("user-1").unwrap()
    };
    let second = {
        let store = KeyStore::open(dir.path()).unwrap();
        store.get_or_create("user-1").unwrap()
    };

    assert_eq!(first.key_id, second.key_id);
    assert_eq!(first.public_key, second.public_key);
}
