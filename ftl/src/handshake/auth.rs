use hmac::{Hmac, Mac, NewMac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Computes the hex encoded digest that proves knowledge of the stream key without sending
/// it.  Returns `None` only if the key cannot be used as an HMAC key.
pub fn compute_digest(authentication_key: &str, nonce: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_varkey(authentication_key.as_bytes()).ok()?;
    mac.update(nonce);
    Some(hex::encode(mac.finalize().into_bytes()))
}
