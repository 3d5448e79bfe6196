//! Turns a notification plus sender configuration into the endpoint,
//! headers, and body a push service expects. Pure composition; the HTTP
//! request itself is issued by an external client.

use http::{header, HeaderMap, HeaderName, HeaderValue, Uri};

use crate::keys::PUBLIC_KEY_LENGTH;
use crate::vapid::Vapid;
use crate::{Error, AUTH_SECRET_LENGTH};

const TTL: HeaderName = HeaderName::from_static("ttl");
const URGENCY: HeaderName = HeaderName::from_static("urgency");
const TOPIC: HeaderName = HeaderName::from_static("topic");
const CRYPTO_KEY: HeaderName = HeaderName::from_static("crypto-key");

/// Endpoints below this prefix predate VAPID and are authenticated with a
/// Google Cloud Messaging API key instead.
const LEGACY_GCM_ENDPOINT_PREFIX: &str = "https://android.googleapis.com/gcm/send";

/// One browser push subscription, as handed over by the user agent.
#[derive(Clone, Debug)]
pub struct Subscription {
    pub endpoint: Uri,
    /// The subscription's `p256dh` key, an uncompressed P-256 point.
    pub public_key: [u8; PUBLIC_KEY_LENGTH],
    /// The subscription's `auth` secret.
    pub auth_secret: [u8; AUTH_SECRET_LENGTH],
}

impl Subscription {
    pub fn new(
        endpoint: Uri,
        public_key: [u8; PUBLIC_KEY_LENGTH],
        auth_secret: [u8; AUTH_SECRET_LENGTH],
    ) -> Self {
        Self {
            endpoint,
            public_key,
            auth_secret,
        }
    }

    /// The push service origin a VAPID token is scoped to. Ports are not
    /// part of the audience claim.
    pub fn origin(&self) -> Result<String, Error> {
        let scheme = self.endpoint.scheme_str().ok_or(Error::InvalidEndpoint)?;
        let host = self.endpoint.host().ok_or(Error::InvalidEndpoint)?;

        Ok(format!("{scheme}://{host}"))
    }

    fn is_legacy_gcm(&self) -> bool {
        self.endpoint.to_string().starts_with(LEGACY_GCM_ENDPOINT_PREFIX)
    }
}

/// RFC 8030 message urgency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl Urgency {
    fn as_str(&self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

/// One message to one subscription. Constructed per send and not mutated
/// afterwards.
#[derive(Clone, Debug)]
pub struct Notification {
    pub subscription: Subscription,
    pub payload: Option<Vec<u8>>,
    /// Seconds the push service may retain the message.
    pub ttl: u32,
    pub urgency: Option<Urgency>,
    /// Replaces a previously queued message with the same topic.
    pub topic: Option<String>,
    /// Detected from the endpoint at construction; overridable.
    pub legacy_gcm: bool,
}

impl Notification {
    pub fn new(subscription: Subscription, payload: impl Into<Vec<u8>>, ttl: u32) -> Self {
        let legacy_gcm = subscription.is_legacy_gcm();
        Self {
            subscription,
            payload: Some(payload.into()),
            ttl,
            urgency: None,
            topic: None,
            legacy_gcm,
        }
    }

    /// A bodyless notification, which only wakes the service worker.
    pub fn without_payload(subscription: Subscription, ttl: u32) -> Self {
        let legacy_gcm = subscription.is_legacy_gcm();
        Self {
            subscription,
            payload: None,
            ttl,
            urgency: None,
            topic: None,
            legacy_gcm,
        }
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Everything an external HTTP client needs to deliver one notification.
pub struct PushRequest {
    pub endpoint: Uri,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Read-only sender configuration: the legacy GCM API key and the VAPID
/// identity. Built once per sender and shared across concurrent sends.
#[derive(Clone, Default)]
pub struct PushService {
    gcm_api_key: Option<String>,
    vapid: Option<Vapid>,
}

impl PushService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gcm_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.gcm_api_key = Some(api_key.into());
        self
    }

    pub fn with_vapid(mut self, vapid: Vapid) -> Self {
        self.vapid = Some(vapid);
        self
    }

    /// Encrypts the payload (if any) and assembles headers and body for the
    /// subscription's endpoint.
    pub fn prepare(&self, notification: &Notification) -> Result<PushRequest, Error> {
        let subscription = &notification.subscription;
        let mut headers = HeaderMap::new();
        headers.insert(TTL, HeaderValue::from(notification.ttl));

        if let Some(urgency) = notification.urgency {
            headers.insert(URGENCY, HeaderValue::from_static(urgency.as_str()));
        }

        if let Some(topic) = &notification.topic {
            headers.insert(TOPIC, HeaderValue::from_str(topic)?);
        }

        let body = match &notification.payload {
            Some(payload) => {
                let encrypted =
                    crate::encrypt(payload, &subscription.public_key, &subscription.auth_secret)?;

                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("aes128gcm"));

                encrypted.body
            }
            None => Vec::new(),
        };

        if notification.legacy_gcm {
            let api_key = self.gcm_api_key.as_ref().ok_or(Error::MissingCredential)?;
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("key={api_key}"))?,
            );
        } else if let Some(vapid) = &self.vapid {
            let audience = subscription.origin()?;
            let token = vapid.sign(&audience)?;

            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&token.authorization_value())?,
            );
            append_crypto_key(&mut headers, &token.crypto_key_value())?;
        }

        tracing::debug!(
            endpoint = %subscription.endpoint,
            has_payload = notification.payload.is_some(),
            "prepared push request"
        );

        Ok(PushRequest {
            endpoint: subscription.endpoint.clone(),
            headers,
            body,
        })
    }
}

/// Joins a `Crypto-Key` contribution onto a value that may already carry
/// parameters for another purpose.
fn append_crypto_key(headers: &mut HeaderMap, contribution: &str) -> Result<(), Error> {
    let value = match headers.get(&CRYPTO_KEY).and_then(|value| value.to_str().ok()) {
        Some(existing) => HeaderValue::from_str(&format!("{existing};{contribution}"))?,
        None => HeaderValue::from_str(contribution)?,
    };
    headers.insert(CRYPTO_KEY, value);

    Ok(())
}
