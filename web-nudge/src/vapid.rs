//! Voluntary Application Server Identification for Web Push (VAPID),
//! RFC 8292: a short-lived ES256 JWT plus the matching public key prove to
//! the push service who is sending, without a pre-registered account.

use aes_gcm::aead::OsRng;
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use time::{Duration, OffsetDateTime};

use crate::keys::{self, PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH};
use crate::Error;

/// Push services reject tokens that claim to be valid for more than 24
/// hours; 12 matches what the ecosystem conventionally issues. Fixed, not
/// configurable.
const TOKEN_LIFETIME: Duration = Duration::hours(12);

const TOKEN_HEADER: &str = r#"{"typ":"JWT","alg":"ES256"}"#;

/// Identifies the sender so a push service operator can get in touch.
#[derive(Clone, Debug)]
pub enum Subject {
    Email(String),
    Https(String),
}

impl Subject {
    fn claim_value(&self) -> String {
        match self {
            Subject::Email(email) => format!("mailto:{email}"),
            Subject::Https(url) => url.clone(),
        }
    }
}

/// Application server identity: subject plus the P-256 signing key pair.
/// Construction validates that the two key halves belong together, so a
/// misconfigured pair fails here instead of as a rejected push.
#[derive(Clone)]
pub struct Vapid {
    subject: Subject,
    signing_key: SigningKey,
    public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl Vapid {
    /// Creates an identity from both key halves, checking that the private
    /// scalar actually produces the public point.
    pub fn new(
        subject: Subject,
        private_key: &[u8; PRIVATE_KEY_LENGTH],
        public_key: &[u8; PUBLIC_KEY_LENGTH],
    ) -> Result<Self, Error> {
        let signing_key =
            SigningKey::from_bytes(private_key.into()).map_err(|_| Error::InvalidKeyFormat)?;

        if public_key_bytes(&signing_key) != *public_key {
            return Err(Error::KeyPairMismatch);
        }

        Ok(Self {
            subject,
            signing_key,
            public_key: *public_key,
        })
    }

    /// Creates an identity from base64url key material as it comes out of
    /// configuration.
    pub fn from_base64(subject: Subject, private_key: &str, public_key: &str) -> Result<Self, Error> {
        let private_key = keys::load_private_key(private_key)?;
        let public_key = keys::save_public_key(&keys::load_public_key(public_key)?);

        Self::new(subject, &private_key.to_bytes().into(), &public_key)
    }

    /// Creates an identity from the private key alone, deriving the public
    /// half.
    pub fn with_private_key(
        subject: Subject,
        private_key: &[u8; PRIVATE_KEY_LENGTH],
    ) -> Result<Self, Error> {
        let signing_key =
            SigningKey::from_bytes(private_key.into()).map_err(|_| Error::InvalidKeyFormat)?;
        let public_key = public_key_bytes(&signing_key);

        Ok(Self {
            subject,
            signing_key,
            public_key,
        })
    }

    /// Generates a fresh identity, for first-time setup.
    pub fn generate(subject: Subject) -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = public_key_bytes(&signing_key);

        Self {
            subject,
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    pub fn public_key_base64(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(self.public_key)
    }

    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_LENGTH] {
        self.signing_key.to_bytes().into()
    }

    /// Signs a token for one push service origin. Tokens are cheap and
    /// short-lived, so one is issued per send instead of cached.
    pub fn sign(&self, audience: &str) -> Result<VapidToken, Error> {
        self.sign_at(audience, OffsetDateTime::now_utc())
    }

    fn sign_at(&self, audience: &str, now: OffsetDateTime) -> Result<VapidToken, Error> {
        let expires = (now + TOKEN_LIFETIME).unix_timestamp();
        let claims = format!(
            r#"{{"aud":"{audience}","exp":{expires},"sub":"{subject}"}}"#,
            subject = self.subject.claim_value()
        );

        let signing_input = format!(
            "{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            BASE64_URL_SAFE_NO_PAD.encode(claims)
        );

        let signature: Signature = self
            .signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|_| Error::CryptoFailure)?;

        tracing::trace!(%audience, expires, "signed vapid token");

        Ok(VapidToken {
            token: format!(
                "{signing_input}.{}",
                BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes())
            ),
            public_key: self.public_key_base64(),
        })
    }
}

/// A signed token ready to be rendered into the request headers.
#[derive(Clone, Debug)]
pub struct VapidToken {
    /// Compact JWS serialization: header, claims, signature.
    pub token: String,
    /// Unpadded base64url uncompressed public key.
    pub public_key: String,
}

impl VapidToken {
    /// The `Authorization` scheme from RFC 8292 section 3.
    pub fn authorization_value(&self) -> String {
        format!("vapid t={},k={}", self.token, self.public_key)
    }

    /// The `Crypto-Key` contribution some push services still expect
    /// alongside the `vapid` scheme.
    pub fn crypto_key_value(&self) -> String {
        format!("p256ecdsa={}", self.public_key)
    }
}

fn public_key_bytes(signing_key: &SigningKey) -> [u8; PUBLIC_KEY_LENGTH] {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
    bytes.copy_from_slice(point.as_bytes());
    bytes
}
