//! Web Push message encryption (RFC 8291) and VAPID authentication
//! (RFC 8292) without the HTTP transport. The crate turns a subscription,
//! a payload, and an optional application server key pair into the headers
//! and body a push endpoint expects; sending the request is left to the
//! caller's HTTP client.

use aes_gcm::{
    aead::{AeadMutInPlace, OsRng},
    Aes128Gcm, KeyInit, Nonce,
};
use p256::SecretKey;
use rand_chacha::rand_core::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

pub mod keys;
pub mod request;
pub mod vapid;

use keys::PUBLIC_KEY_LENGTH;

/// Length of the `auth` secret a user agent shares at subscription time.
pub const AUTH_SECRET_LENGTH: usize = 16;

const KEY_INFO_LABEL: &[u8; 13] = b"WebPush: info";
// The info constants carry the RFC 8291 zero terminator plus the 0x01
// counter byte of a single-block HKDF-Expand, so a plain HMAC over them is
// a complete expand step.
const CONTENT_ENCRYPTION_KEY_INFO: &[u8; 29] = b"Content-Encoding: aes128gcm\x00\x01";
const NONCE_INFO: &[u8; 25] = b"Content-Encoding: nonce\x00\x01";
const EXPAND_COUNTER: u8 = 0x01;

/// Delimiter marking the final (here: only) record of the content coding.
const LAST_RECORD_DELIMITER: u8 = 0x02;

const SALT_LENGTH: usize = 16;
const RECORD_SIZE: u32 = 4096;
const RECORD_SIZE_LENGTH: usize = 4;
const KEY_ID_LENGTH: usize = 1;
const CONTENT_ENCRYPTION_KEY_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

const ENVELOPE_HEADER_LENGTH: usize =
    SALT_LENGTH + RECORD_SIZE_LENGTH + KEY_ID_LENGTH + PUBLIC_KEY_LENGTH;

/// Failures surfaced by the push core. None of these are retried
/// internally; transient transport errors are the HTTP client's concern.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key material is malformed or has the wrong length")]
    InvalidKeyFormat,
    #[error("recipient public key is not a valid point on P-256")]
    InvalidRecipientKey,
    #[error("public and private key do not form a pair")]
    KeyPairMismatch,
    #[error("a GCM API key is required to push to a legacy GCM endpoint")]
    MissingCredential,
    #[error("push endpoint is missing a scheme or host")]
    InvalidEndpoint,
    #[error("value is not a valid HTTP header value")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    #[error("AEAD or signing operation failed")]
    CryptoFailure,
}

/// Output of encrypting one push message. The ephemeral key pair behind
/// `sender_public_key` is generated per message and never reused.
pub struct EncryptionResult {
    pub salt: [u8; SALT_LENGTH],
    pub sender_public_key: [u8; PUBLIC_KEY_LENGTH],
    /// Complete `aes128gcm` envelope: salt, record size, key id, ciphertext.
    pub body: Vec<u8>,
}

/// Encrypts a payload for the subscription identified by its public key and
/// auth secret, without padding.
pub fn encrypt(
    plaintext: &[u8],
    recipient_public_key: &[u8; PUBLIC_KEY_LENGTH],
    auth_secret: &[u8; AUTH_SECRET_LENGTH],
) -> Result<EncryptionResult, Error> {
    encrypt_with_padding(plaintext, 0, recipient_public_key, auth_secret)
}

/// Encrypts a payload with `padding` zero bytes appended after the record
/// delimiter. Padding obscures the plaintext length; how much to use is
/// caller policy.
pub fn encrypt_with_padding(
    plaintext: &[u8],
    padding: usize,
    recipient_public_key: &[u8; PUBLIC_KEY_LENGTH],
    auth_secret: &[u8; AUTH_SECRET_LENGTH],
) -> Result<EncryptionResult, Error> {
    let ephemeral_secret = SecretKey::random(&mut OsRng);
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);

    seal_record(
        &ephemeral_secret,
        salt,
        plaintext,
        padding,
        recipient_public_key,
        auth_secret,
    )
}

/// Deterministic tail of the encryption: everything after the per-message
/// randomness has been drawn.
fn seal_record(
    ephemeral_secret: &SecretKey,
    salt: [u8; SALT_LENGTH],
    plaintext: &[u8],
    padding: usize,
    recipient_public_key: &[u8; PUBLIC_KEY_LENGTH],
    auth_secret: &[u8; AUTH_SECRET_LENGTH],
) -> Result<EncryptionResult, Error> {
    let recipient_key = p256::PublicKey::from_sec1_bytes(recipient_public_key)
        .map_err(|_| Error::InvalidRecipientKey)?;

    let sender_public_key = keys::save_public_key(&ephemeral_secret.public_key());

    let shared_secret = p256::ecdh::diffie_hellman(
        ephemeral_secret.to_nonzero_scalar(),
        recipient_key.as_affine(),
    );
    let mut ecdh_secret = [0u8; 32];
    ecdh_secret.copy_from_slice(shared_secret.raw_secret_bytes().as_slice());

    let (mut content_encryption_key, mut nonce) = derive_keys(
        &ecdh_secret,
        auth_secret,
        &salt,
        recipient_public_key,
        &sender_public_key,
    );
    ecdh_secret.zeroize();

    let ciphertext = seal(&content_encryption_key, &nonce, plaintext, padding);
    content_encryption_key.zeroize();
    nonce.zeroize();
    let ciphertext = ciphertext?;

    let mut body = Vec::with_capacity(ENVELOPE_HEADER_LENGTH + ciphertext.len());
    body.extend_from_slice(&envelope_header(&salt, &sender_public_key));
    body.extend_from_slice(&ciphertext);

    Ok(EncryptionResult {
        salt,
        sender_public_key,
        body,
    })
}

/// RFC 8291 key derivation. Both sides run this with the same inputs: the
/// recipient is always the user agent, the sender the application server.
fn derive_keys(
    ecdh_secret: &[u8; 32],
    auth_secret: &[u8; AUTH_SECRET_LENGTH],
    salt: &[u8; SALT_LENGTH],
    recipient_public_key: &[u8; PUBLIC_KEY_LENGTH],
    sender_public_key: &[u8; PUBLIC_KEY_LENGTH],
) -> (
    [u8; CONTENT_ENCRYPTION_KEY_LENGTH],
    [u8; NONCE_LENGTH],
) {
    // HKDF-Extract(salt=auth_secret, IKM=ecdh_secret)
    let mut key_pseudo_random_key =
        libcrux_hkdf::extract(libcrux_hkdf::Algorithm::Sha256, auth_secret, ecdh_secret);

    // HKDF-Expand(PRK_key, key_info, L_key=32)
    let key_info = key_info(recipient_public_key, sender_public_key);
    let mut input_keying_material = libcrux_hmac::hmac(
        libcrux_hmac::Algorithm::Sha256,
        &key_pseudo_random_key,
        &key_info,
        Some(32),
    );
    key_pseudo_random_key.zeroize();

    // HKDF-Extract(salt, IKM)
    let mut pseudo_random_key = libcrux_hmac::hmac(
        libcrux_hmac::Algorithm::Sha256,
        salt,
        &input_keying_material,
        None,
    );
    input_keying_material.zeroize();

    // HKDF-Expand(PRK, cek_info, L_cek=16)
    let okm = libcrux_hmac::hmac(
        libcrux_hmac::Algorithm::Sha256,
        &pseudo_random_key,
        CONTENT_ENCRYPTION_KEY_INFO,
        Some(CONTENT_ENCRYPTION_KEY_LENGTH),
    );
    let mut content_encryption_key = [0u8; CONTENT_ENCRYPTION_KEY_LENGTH];
    content_encryption_key.copy_from_slice(&okm);

    // HKDF-Expand(PRK, nonce_info, L_nonce=12)
    let okm = libcrux_hmac::hmac(
        libcrux_hmac::Algorithm::Sha256,
        &pseudo_random_key,
        NONCE_INFO,
        Some(NONCE_LENGTH),
    );
    pseudo_random_key.zeroize();
    let mut nonce = [0u8; NONCE_LENGTH];
    nonce.copy_from_slice(&okm);

    (content_encryption_key, nonce)
}

const KEY_INFO_LENGTH: usize = KEY_INFO_LABEL.len() + 1 + PUBLIC_KEY_LENGTH * 2 + 1;

/// Info for the combined-key expand step: label, zero terminator, user
/// agent public key, application server public key, expand counter.
fn key_info(
    recipient_public_key: &[u8; PUBLIC_KEY_LENGTH],
    sender_public_key: &[u8; PUBLIC_KEY_LENGTH],
) -> [u8; KEY_INFO_LENGTH] {
    const LABEL_END: usize = KEY_INFO_LABEL.len() + 1;
    let mut info = [0u8; KEY_INFO_LENGTH];
    info[..KEY_INFO_LABEL.len()].copy_from_slice(KEY_INFO_LABEL);
    // info[KEY_INFO_LABEL.len()] is the zero terminator
    info[LABEL_END..LABEL_END + PUBLIC_KEY_LENGTH].copy_from_slice(recipient_public_key);
    info[LABEL_END + PUBLIC_KEY_LENGTH..LABEL_END + PUBLIC_KEY_LENGTH * 2]
        .copy_from_slice(sender_public_key);
    info[LABEL_END + PUBLIC_KEY_LENGTH * 2] = EXPAND_COUNTER;

    info
}

/// Appends the last-record delimiter and padding, then seals in place with
/// AES-128-GCM. The tag ends up appended to the ciphertext.
fn seal(
    key: &[u8; CONTENT_ENCRYPTION_KEY_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
    plaintext: &[u8],
    padding: usize,
) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::with_capacity(plaintext.len() + 1 + padding + TAG_LENGTH);
    buffer.extend_from_slice(plaintext);
    buffer.push(LAST_RECORD_DELIMITER);
    buffer.resize(buffer.len() + padding, 0);

    let mut cipher = Aes128Gcm::new_from_slice(key).map_err(|_| Error::CryptoFailure)?;
    cipher
        .encrypt_in_place(Nonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|_| Error::CryptoFailure)?;

    Ok(buffer)
}

const _: () = assert!(
    PUBLIC_KEY_LENGTH <= u8::MAX as usize,
    "key id length must fit the one-byte envelope field"
);

fn envelope_header(
    salt: &[u8; SALT_LENGTH],
    sender_public_key: &[u8; PUBLIC_KEY_LENGTH],
) -> [u8; ENVELOPE_HEADER_LENGTH] {
    let mut header = [0u8; ENVELOPE_HEADER_LENGTH];
    header[..SALT_LENGTH].copy_from_slice(salt);
    header[SALT_LENGTH..SALT_LENGTH + RECORD_SIZE_LENGTH]
        .copy_from_slice(&RECORD_SIZE.to_be_bytes());
    header[SALT_LENGTH + RECORD_SIZE_LENGTH] = PUBLIC_KEY_LENGTH as u8;
    header[SALT_LENGTH + RECORD_SIZE_LENGTH + KEY_ID_LENGTH..].copy_from_slice(sender_public_key);
    header
}
