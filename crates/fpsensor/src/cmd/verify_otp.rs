use fpsensor::bringup::constants::{OTP_CHECKSUM_INDEX, OTP_HASH_TABLE};
use fpsensor::bringup::{otp_checksum, verify_otp, CalibrationParams};

use crate::cmd::VerifyOtpArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_otp_report, OtpReport, OutputFormat};

pub fn run(args: VerifyOtpArgs, format: OutputFormat) -> CliResult<i32> {
    let otp = decode_hex(&args.hex)?;
    let valid = verify_otp(&otp, &OTP_HASH_TABLE);

    let report = OtpReport {
        len: otp.len(),
        valid,
        stored_checksum: otp.get(OTP_CHECKSUM_INDEX).map(|b| format!("0x{b:02x}")),
        computed_checksum: otp_checksum(&otp, &OTP_HASH_TABLE).map(|b| format!("0x{b:02x}")),
        calibration: if valid {
            CalibrationParams::from_otp(&otp).ok()
        } else {
            None
        },
    };
    print_otp_report(&report, format);

    Ok(if valid { SUCCESS } else { DATA_INVALID })
}

/// Decode hex text, skipping whitespace and `:` separators.
fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| {
            c.to_digit(16)
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex digit {c:?}")))
        })
        .collect::<CliResult<Vec<u32>>>()?;

    if digits.is_empty() {
        return Err(CliError::new(USAGE, "OTP must not be empty"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "OTP hex has an odd number of digits"));
    }

    Ok(digits
        .chunks_exact(2)
        .map(|pair| ((pair[0] << 4) | pair[1]) as u8)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_separated_hex() {
        assert_eq!(decode_hex("0b:30 55\n7A").unwrap(), vec![0x0b, 0x30, 0x55, 0x7a]);
    }

    #[test]
    fn rejects_bad_hex() {
        assert_eq!(decode_hex("0g").unwrap_err().code, USAGE);
        assert_eq!(decode_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(decode_hex("  ").unwrap_err().code, USAGE);
    }
}
