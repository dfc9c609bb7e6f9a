//! Integrity checks against untrusted sensor data.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::{OTP_CHECKSUM_INDEX, OTP_MIN_LEN};

/// Size of the PSK seed the expected digest is derived from.
pub const PSK_SEED_LEN: usize = 32;

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Digest the device is expected to report for its provisioned PSK.
///
/// Derived from an all-zero seed, so every device shares the same value.
pub fn expected_psk_digest() -> [u8; 32] {
    sha256(&[0u8; PSK_SEED_LEN])
}

/// Complemented CRC over `otp`, skipping the stored checksum byte.
///
/// `None` when the dump is too short to carry every calibration field.
pub fn otp_checksum(otp: &[u8], table: &[u8; 256]) -> Option<u8> {
    if otp.len() < OTP_MIN_LEN {
        return None;
    }
    let crc = otp
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != OTP_CHECKSUM_INDEX)
        .fold(0u8, |crc, (_, byte)| table[usize::from(crc ^ byte)]);
    Some(!crc)
}

/// Accept or reject an OTP dump; there is no partial credit.
pub fn verify_otp(otp: &[u8], table: &[u8; 256]) -> bool {
    otp_checksum(otp, table).is_some_and(|sum| sum == otp[OTP_CHECKSUM_INDEX])
}

/// Compare a device-reported PSK digest with the expected one in constant time.
pub fn psk_matches(received: &[u8], expected: &[u8]) -> bool {
    received.len() == expected.len() && bool::from(received.ct_eq(expected))
}
