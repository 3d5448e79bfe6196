use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use web_nudge::vapid::{Subject, Vapid};

/// Generates a fresh VAPID key pair for first-time setup and prints it in
/// the unpadded base64url form configuration expects.
fn main() {
    let vapid = Vapid::generate(Subject::Email("push@example.com".into()));

    println!("public key:  {}", vapid.public_key_base64());
    println!(
        "private key: {}",
        BASE64_URL_SAFE_NO_PAD.encode(vapid.private_key_bytes())
    );
}
