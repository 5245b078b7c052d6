//! Pickup credential generators
//!
//! The generated PIN and QR token are the literal pickup credentials handed
//! to the guardian at drop-off (printed on a receipt); the system never
//! re-derives them. Backup codes use the same PIN generator and are not
//! deduplicated against each other or the primary PIN.

use rand::Rng;

/// Generate a 6-digit security PIN, uniform over [100000, 999999]
pub fn generate_security_pin() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Generate an opaque QR token: `CHK_` + 8 random bytes as uppercase hex
pub fn generate_qr_token() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    format!("CHK_{}", hex)
}

/// Generate `count` backup authorization codes, each a fresh PIN draw
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count).map(|_| generate_security_pin()).collect()
}

/// Mask a submitted PIN for the audit trail, keeping only the first two digits
pub fn mask_pin(pin: &str) -> String {
    if pin.is_empty() {
        "******".to_string()
    } else {
        format!("{}****", &pin[..pin.len().min(2)])
    }
}
