//! Reference constants shared by every session.
//!
//! All of these are read-only for the lifetime of the process.

/// Firmware builds the bring-up sequence knows how to drive.
pub const FIRMWARE_VERSIONS: [&str; 2] = ["GF5288_HTSEC_APP_10011", "GF5288_HTSEC_APP_10020"];

/// Expected value of `chip_id >> 8`.
pub const CHIP_ID_HIGH: u32 = 0x220C;

/// Sensor image width in pixels.
pub const SENSOR_WIDTH: usize = 88;

/// Sensor image height in pixels.
pub const SENSOR_HEIGHT: usize = 108;

/// Pixels excluded on every side when comparing reference images.
pub const IMAGE_BORDER: usize = 2;

/// Default bozorth3 match threshold reported to the host.
pub const BZ3_THRESHOLD: u32 = 24;

/// Position of the stored checksum inside the OTP dump.
pub const OTP_CHECKSUM_INDEX: usize = 25;

/// Shortest OTP dump that carries every calibration field.
pub const OTP_MIN_LEN: usize = 32;

/// Payload of the enable-chip command.
pub const ENABLE_PAYLOAD: [u8; 4] = [0x00, 0x00, 0x00, 0x04];

/// Payload of the sleep command.
pub const SLEEP_PAYLOAD: [u8; 2] = [0x01, 0x00];

/// FDT capture mode with the transmitter driving.
pub const FDT_MODE_TX_ON: u8 = 0x0D;

/// FDT capture mode with the transmitter idle.
pub const FDT_MODE_TX_OFF: u8 = 0x8D;

/// Image capture flags with the transmitter driving.
pub const IMAGE_MODE_TX_ON: u8 = 0x01;

/// Image capture flags with the transmitter idle.
pub const IMAGE_MODE_TX_OFF: u8 = 0x81;

/// CRC-8 (polynomial 0x07) lookup table used for the OTP integrity check.
pub const OTP_HASH_TABLE: [u8; 256] = [
    0x00, 0x07, 0x0e, 0x09, 0x1c, 0x1b, 0x12, 0x15, 0x38, 0x3f, 0x36, 0x31, 0x24, 0x23, 0x2a, 0x2d,
    0x70, 0x77, 0x7e, 0x79, 0x6c, 0x6b, 0x62, 0x65, 0x48, 0x4f, 0x46, 0x41, 0x54, 0x53, 0x5a, 0x5d,
    0xe0, 0xe7, 0xee, 0xe9, 0xfc, 0xfb, 0xf2, 0xf5, 0xd8, 0xdf, 0xd6, 0xd1, 0xc4, 0xc3, 0xca, 0xcd,
    0x90, 0x97, 0x9e, 0x99, 0x8c, 0x8b, 0x82, 0x85, 0xa8, 0xaf, 0xa6, 0xa1, 0xb4, 0xb3, 0xba, 0xbd,
    0xc7, 0xc0, 0xc9, 0xce, 0xdb, 0xdc, 0xd5, 0xd2, 0xff, 0xf8, 0xf1, 0xf6, 0xe3, 0xe4, 0xed, 0xea,
    0xb7, 0xb0, 0xb9, 0xbe, 0xab, 0xac, 0xa5, 0xa2, 0x8f, 0x88, 0x81, 0x86, 0x93, 0x94, 0x9d, 0x9a,
    0x27, 0x20, 0x29, 0x2e, 0x3b, 0x3c, 0x35, 0x32, 0x1f, 0x18, 0x11, 0x16, 0x03, 0x04, 0x0d, 0x0a,
    0x57, 0x50, 0x59, 0x5e, 0x4b, 0x4c, 0x45, 0x42, 0x6f, 0x68, 0x61, 0x66, 0x73, 0x74, 0x7d, 0x7a,
    0x89, 0x8e, 0x87, 0x80, 0x95, 0x92, 0x9b, 0x9c, 0xb1, 0xb6, 0xbf, 0xb8, 0xad, 0xaa, 0xa3, 0xa4,
    0xf9, 0xfe, 0xf7, 0xf0, 0xe5, 0xe2, 0xeb, 0xec, 0xc1, 0xc6, 0xcf, 0xc8, 0xdd, 0xda, 0xd3, 0xd4,
    0x69, 0x6e, 0x67, 0x60, 0x75, 0x72, 0x7b, 0x7c, 0x51, 0x56, 0x5f, 0x58, 0x4d, 0x4a, 0x43, 0x44,
    0x19, 0x1e, 0x17, 0x10, 0x05, 0x02, 0x0b, 0x0c, 0x21, 0x26, 0x2f, 0x28, 0x3d, 0x3a, 0x33, 0x34,
    0x4e, 0x49, 0x40, 0x47, 0x52, 0x55, 0x5c, 0x5b, 0x76, 0x71, 0x78, 0x7f, 0x6a, 0x6d, 0x64, 0x63,
    0x3e, 0x39, 0x30, 0x37, 0x22, 0x25, 0x2c, 0x2b, 0x06, 0x01, 0x08, 0x0f, 0x1a, 0x1d, 0x14, 0x13,
    0xae, 0xa9, 0xa0, 0xa7, 0xb2, 0xb5, 0xbc, 0xbb, 0x96, 0x91, 0x98, 0x9f, 0x8a, 0x8d, 0x84, 0x83,
    0xde, 0xd9, 0xd0, 0xd7, 0xc2, 0xc5, 0xcc, 0xcb, 0xe6, 0xe1, 0xe8, 0xef, 0xfa, 0xfd, 0xf4, 0xf3,
];

/// White-box encoding of the pre-shared key written during provisioning.
pub const PSK_WHITE_BOX: [u8; 96] = [
    0xec, 0x35, 0xae, 0x3a, 0xbb, 0x45, 0xed, 0x3f, 0x12, 0xc4, 0x75, 0x1f, 0x1e, 0x5c, 0x2c, 0xc0,
    0x5b, 0x3c, 0x54, 0x52, 0xe9, 0x10, 0x4d, 0x9f, 0x2a, 0x31, 0x18, 0x64, 0x4f, 0x37, 0xa0, 0x4b,
    0x6f, 0xd6, 0x6b, 0x1d, 0x97, 0xcf, 0x80, 0xf1, 0x34, 0x5f, 0x76, 0xc8, 0x4f, 0x03, 0xff, 0x30,
    0xbb, 0x51, 0xbf, 0x30, 0x8f, 0x2a, 0x98, 0x75, 0xc4, 0x1e, 0x65, 0x92, 0xcd, 0x2a, 0x2f, 0x9e,
    0x60, 0x80, 0x9b, 0x17, 0xb5, 0x31, 0x60, 0x37, 0xb6, 0x9b, 0xb2, 0xfa, 0x5d, 0x4c, 0x8a, 0xc3,
    0x1e, 0xdb, 0x33, 0x94, 0x04, 0x6e, 0xc0, 0x6b, 0xbd, 0xac, 0xc5, 0x7d, 0xa6, 0xa7, 0x56, 0xc5,
];

/// Placeholder register configuration uploaded before baseline capture.
///
/// These bytes only exercise the upload path against the emulator. They are
/// not the sensor's factory blob; real hardware needs its own configuration
/// supplied through [`BringupConfig::factory_config`].
///
/// The trailing 16-bit word is a checksum; it is recomputed before every
/// upload, see [`crate::link::prepare_config`].
///
/// [`BringupConfig::factory_config`]: crate::config::BringupConfig::factory_config
pub const FACTORY_CONFIG: [u8; 64] = [
    0x70, 0x11, 0x60, 0x71, 0x2c, 0x9d, 0x2c, 0xc9, 0x1c, 0xe5, 0x18, 0x79, 0x00, 0x00, 0x00, 0x00,
    0x38, 0x78, 0x28, 0x7c, 0xfc, 0xab, 0x3c, 0x95, 0xc0, 0xc3, 0xe3, 0x0d, 0x6f, 0xfa, 0x3d, 0x3a,
    0x62, 0x90, 0xbb, 0x9b, 0xdf, 0xbb, 0xa6, 0x5d, 0x9d, 0x32, 0xa2, 0x59, 0x11, 0x88, 0xb7, 0xdd,
    0x33, 0xda, 0x30, 0x20, 0x4a, 0x4a, 0x44, 0x3e, 0x76, 0x8e, 0x30, 0xbf, 0xc7, 0x72, 0x5b, 0xa7,
];
