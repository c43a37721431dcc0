//! Identity verification and application secrets.
//!
//! Integrators prove that an external user ID belongs to them by sending
//! `hex(HMAC-SHA256(external_user_id, key = application auth key))` along
//! with the device payload.

use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a generated application auth key.
pub const AUTH_KEY_LEN: usize = 64;

fn mac_for(auth_key: &str, external_user_id: &str) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(auth_key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(external_user_id.as_bytes());
    mac
}

/// Lowercase hex HMAC-SHA256 of `external_user_id` keyed by `auth_key`.
pub fn compute_identity_hash(external_user_id: &str, auth_key: &str) -> String {
    hex::encode(mac_for(auth_key, external_user_id).finalize().into_bytes())
}

/// Check a caller-supplied hash in constant time.
///
/// Hex case is ignored. Anything that is not valid hex is a mismatch.
pub fn verify_identity_hash(external_user_id: &str, supplied_hash: &str, auth_key: &str) -> bool {
    let Ok(supplied) = hex::decode(supplied_hash) else {
        return false;
    };
    mac_for(auth_key, external_user_id)
        .verify_slice(&supplied)
        .is_ok()
}

/// Generate a fresh random application auth key.
pub fn generate_auth_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTH_KEY_LEN)
        .map(char::from)
        .collect()
}
