//! Parsing and serialization of the P-256 key encodings the push protocol
//! uses: uncompressed SEC1 points for public keys, raw scalars for private
//! keys, unpadded URL-safe base64 at the protocol boundary.

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};

use crate::Error;

/// Uncompressed point encoding: 0x04 prefix plus the two 32-byte
/// coordinates.
pub const PUBLIC_KEY_LENGTH: usize = 65;
pub const PRIVATE_KEY_LENGTH: usize = 32;

const UNCOMPRESSED_POINT_PREFIX: u8 = 0x04;

/// Decodes a base64url public key as found in a subscription's `p256dh`
/// field or a VAPID `k` parameter.
pub fn load_public_key(encoded: &str) -> Result<PublicKey, Error> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| Error::InvalidKeyFormat)?;

    load_public_key_bytes(&bytes)
}

/// Decodes an uncompressed point. The point has to be on the P-256 curve,
/// the only curve the protocol supports.
pub fn load_public_key_bytes(bytes: &[u8]) -> Result<PublicKey, Error> {
    if bytes.len() != PUBLIC_KEY_LENGTH || bytes[0] != UNCOMPRESSED_POINT_PREFIX {
        return Err(Error::InvalidKeyFormat);
    }

    PublicKey::from_sec1_bytes(bytes).map_err(|_| Error::InvalidKeyFormat)
}

/// Decodes a base64url private key scalar.
pub fn load_private_key(encoded: &str) -> Result<SecretKey, Error> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| Error::InvalidKeyFormat)?;

    load_private_key_bytes(&bytes)
}

pub fn load_private_key_bytes(bytes: &[u8]) -> Result<SecretKey, Error> {
    if bytes.len() != PRIVATE_KEY_LENGTH {
        return Err(Error::InvalidKeyFormat);
    }

    SecretKey::from_slice(bytes).map_err(|_| Error::InvalidKeyFormat)
}

/// Re-emits the uncompressed point encoding. Round-trips exactly with
/// [`load_public_key_bytes`].
pub fn save_public_key(key: &PublicKey) -> [u8; PUBLIC_KEY_LENGTH] {
    let point = key.to_encoded_point(false);
    let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
    bytes.copy_from_slice(point.as_bytes());
    bytes
}

/// The base64url form used in headers.
pub fn encode_public_key(key: &PublicKey) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(save_public_key(key))
}

#[cfg(test)]
mod test {
    use super::*;

    const USER_AGENT_PUBLIC_KEY: &str = "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcx\
         aOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";
    const APPLICATION_SERVER_PRIVATE_KEY: &str = "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw";

    #[test]
    fn public_key_round_trips() {
        // Arrange
        let key = load_public_key(USER_AGENT_PUBLIC_KEY).unwrap();

        // Act
        let bytes = save_public_key(&key);
        let reloaded = load_public_key_bytes(&bytes).unwrap();

        // Assert
        assert_eq!(key, reloaded);
        assert_eq!(USER_AGENT_PUBLIC_KEY, encode_public_key(&key));
    }

    #[test]
    fn rejects_wrong_public_key_length() {
        let result = load_public_key_bytes(&[UNCOMPRESSED_POINT_PREFIX; 33]);

        assert!(matches!(result, Err(Error::InvalidKeyFormat)));
    }

    #[test]
    fn rejects_compressed_point_prefix() {
        let mut bytes = BASE64_URL_SAFE_NO_PAD.decode(USER_AGENT_PUBLIC_KEY).unwrap();
        bytes[0] = 0x02;

        let result = load_public_key_bytes(&bytes);

        assert!(matches!(result, Err(Error::InvalidKeyFormat)));
    }

    #[test]
    fn rejects_point_off_the_curve() {
        let mut bytes = BASE64_URL_SAFE_NO_PAD.decode(USER_AGENT_PUBLIC_KEY).unwrap();
        bytes[33..].fill(0);

        let result = load_public_key_bytes(&bytes);

        assert!(matches!(result, Err(Error::InvalidKeyFormat)));
    }

    #[test]
    fn rejects_invalid_base64() {
        let result = load_public_key("not base64!");

        assert!(matches!(result, Err(Error::InvalidKeyFormat)));
    }

    #[test]
    fn private_key_loads_and_matches_length() {
        let key = load_private_key(APPLICATION_SERVER_PRIVATE_KEY).unwrap();

        assert_eq!(PRIVATE_KEY_LENGTH, key.to_bytes().len());
    }

    #[test]
    fn rejects_wrong_private_key_length() {
        let result = load_private_key_bytes(&[1u8; 16]);

        assert!(matches!(result, Err(Error::InvalidKeyFormat)));
    }
}
