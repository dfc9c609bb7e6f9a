//! Calibration parameters and baseline validation.
//!
//! Two independent signals are checked during bring-up, each captured once
//! with the transmitter driving and once with it idle:
//! - the finger-detect (FDT) baseline, a short run of 16-bit samples
//! - a full reference image
//!
//! A quiescent sensor produces nearly the same capture in both states; large
//! disagreement points at an unstable channel.

use serde::Serialize;

use crate::constants::{IMAGE_BORDER, OTP_MIN_LEN, SENSOR_HEIGHT, SENSOR_WIDTH};
use crate::error::{BringupError, Result};

/// Per-device calibration state owned by an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalibrationParams {
    /// Largest tolerated per-sample FDT disagreement.
    pub fdt_delta_threshold: u16,
    /// Largest tolerated mean interior pixel disagreement.
    pub image_delta_threshold: u32,
    /// Derived FDT base, empty until baselines are validated.
    pub fdt_base: Vec<u16>,
    /// Transmitter-on reference image, empty until baselines are validated.
    #[serde(skip_serializing)]
    pub calibration_image: Vec<u8>,
    pub tcode: u16,
    pub delta_down: u16,
    pub delta_up: u16,
    pub delta_nav: u16,
    pub dac_h: u16,
    pub dac_l: u16,
}

impl CalibrationParams {
    /// Derive calibration parameters from a verified OTP dump.
    pub fn from_otp(otp: &[u8]) -> Result<Self> {
        if otp.len() < OTP_MIN_LEN {
            return Err(BringupError::InvalidOtp {
                len: otp.len(),
                min: OTP_MIN_LEN,
            });
        }

        let diff = u16::from((otp[17] >> 1) & 0x1f);
        let tcode = if otp[23] != 0 {
            u16::from(otp[23]) + 1
        } else {
            0
        };

        let (delta_fdt, delta_down, delta_up, delta_img, delta_nav) = if diff == 0 {
            (0, 0x0d, 0x0b, 0xc8, 0x28)
        } else {
            let scaled = ((diff + 5) * 0x32) >> 4;
            (
                scaled / 5,
                scaled / 3,
                scaled / 3 - 2,
                0xc8,
                (diff + 5) * 4,
            )
        };

        let dac_h = ((u16::from(otp[17]) << 8) ^ u16::from(otp[22])) & 0x1ff;
        let dac_l = ((u16::from(otp[17]) & 0x40) << 2) ^ u16::from(otp[31]);

        Ok(Self {
            fdt_delta_threshold: delta_fdt,
            image_delta_threshold: delta_img,
            fdt_base: Vec::new(),
            calibration_image: Vec::new(),
            tcode,
            delta_down,
            delta_up,
            delta_nav,
            dac_h,
            dac_l,
        })
    }

    /// Store the validated baseline and reference image.
    pub fn update_bases(&mut self, fdt_base: Vec<u16>, calibration_image: Vec<u8>) {
        self.fdt_base = fdt_base;
        self.calibration_image = calibration_image;
    }
}

fn fdt_samples(raw: &[u8]) -> impl Iterator<Item = u16> + '_ {
    raw.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

/// Largest per-sample disagreement between two FDT captures.
///
/// `None` when the captures cannot be compared sample by sample.
pub fn max_fdt_delta(base_a: &[u8], base_b: &[u8]) -> Option<u16> {
    if base_a.len() != base_b.len() || base_a.len() % 2 != 0 {
        return None;
    }
    Some(
        fdt_samples(base_a)
            .zip(fdt_samples(base_b))
            .map(|(a, b)| (a >> 1).abs_diff(b >> 1))
            .max()
            .unwrap_or(0),
    )
}

/// True when every sample pair differs by at most `max_delta`.
pub fn fdt_base_is_valid(base_a: &[u8], base_b: &[u8], max_delta: u16) -> bool {
    max_fdt_delta(base_a, base_b).is_some_and(|worst| worst <= max_delta)
}

fn interior_delta(image_a: &[u8], image_b: &[u8]) -> Option<(u64, u64)> {
    let expected = SENSOR_WIDTH * SENSOR_HEIGHT;
    if image_a.len() != expected || image_b.len() != expected {
        return None;
    }

    let mut sum = 0u64;
    let mut count = 0u64;
    for row in IMAGE_BORDER..SENSOR_HEIGHT - IMAGE_BORDER {
        let start = row * SENSOR_WIDTH + IMAGE_BORDER;
        let end = (row + 1) * SENSOR_WIDTH - IMAGE_BORDER;
        for (a, b) in image_a[start..end].iter().zip(&image_b[start..end]) {
            sum += u64::from(a.abs_diff(*b));
            count += 1;
        }
    }
    Some((sum, count))
}

/// Mean absolute interior pixel difference, for diagnostics.
pub fn mean_image_delta(image_a: &[u8], image_b: &[u8]) -> Option<f64> {
    interior_delta(image_a, image_b).map(|(sum, count)| sum as f64 / count as f64)
}

/// True when the mean interior pixel difference is at most `threshold`.
///
/// A 2-pixel border on every side is excluded; images of the wrong size are
/// never valid.
pub fn image_is_valid(image_a: &[u8], image_b: &[u8], threshold: u32) -> bool {
    interior_delta(image_a, image_b)
        .is_some_and(|(sum, count)| sum <= u64::from(threshold) * count)
}

/// Convert a transmitter-on FDT capture into the stored FDT base.
pub fn generate_fdt_base(raw: &[u8]) -> Vec<u16> {
    fdt_samples(raw)
        .map(|v| ((u32::from(v & 0xfffe) * 0x80) | u32::from(v >> 1)) as u16)
        .collect()
}
