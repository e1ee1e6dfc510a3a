use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier};

use sol_wallet::{build_transfer, decode_address, SecretKey, LAMPORTS_PER_SOL};

#[test]
fn fresh_keypair_signs_a_submittable_transfer() {
    let deposit = SecretKey::generate();
    let output = SecretKey::generate();

    let to = decode_address(&output.address()).expect("output address decodes");
    let blockhash = [42u8; 32];
    let lamports = LAMPORTS_PER_SOL / 2 - 5_000;

    let payload = build_transfer(&deposit, &to, lamports, &blockhash).expect("build transfer");

    // The payload is exactly what `sendTransaction` expects: base64 over
    // signature count, signature, then the signed message bytes.
    let raw = BASE64.decode(payload).expect("base64 payload");
    assert_eq!(raw[0], 1);

    let signature = Signature::from_slice(&raw[1..65]).expect("signature bytes");
    deposit
        .verifying_key()
        .verify(&raw[65..], &signature)
        .expect("signature verifies against message");

    // The sender and receiver keys appear in the account table in order.
    assert_eq!(&raw[65 + 4..65 + 36], &deposit.public_key()[..]);
    assert_eq!(&raw[65 + 36..65 + 68], &output.public_key()[..]);
}

#[test]
fn secret_round_trips_through_storage_bytes() {
    let secret = SecretKey::generate();
    let stored = secret.to_bytes().to_vec();

    let restored = SecretKey::from_bytes(&stored).expect("64-byte secret");
    assert_eq!(restored.address(), secret.address());
    assert_eq!(restored.seed(), secret.seed());
}
