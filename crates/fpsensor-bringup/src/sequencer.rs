//! The bring-up state machine.
//!
//! States run strictly in order, each exactly once. The first step that fails
//! ends the run, and its state and error are returned unchanged; later states
//! are never attempted. There is no retry here: callers that want one restart
//! the whole bring-up.

use std::fmt;

use bytes::Bytes;
use fpsensor_proto::production::{PSK_DIGEST_READ_TYPE, PSK_WHITE_BOX_WRITE_TYPE};
use fpsensor_proto::{render_hex, ProductionReadRecord, ProductionWrite};
use fpsensor_transport::SensorTransport;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calibration::{
    fdt_base_is_valid, generate_fdt_base, image_is_valid, max_fdt_delta, mean_image_delta,
    CalibrationParams,
};
use crate::config::BringupConfig;
use crate::constants::{OTP_HASH_TABLE, PSK_WHITE_BOX};
use crate::error::{BringupError, BringupFailure, Result};
use crate::link::{prepare_config, DeviceLink};
use crate::secure::SecureChannel;
use crate::verifier::{expected_psk_digest, psk_matches, verify_otp};

/// One step of the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BringupState {
    InitDevice,
    CheckFirmware,
    DeviceEnable,
    CheckSensor,
    CheckPsk,
    WritePsk,
    EstablishGtsConnection,
    UpdateAllBase,
    SetSleepMode,
}

impl BringupState {
    /// Every state, in execution order.
    pub const ALL: [BringupState; 9] = [
        BringupState::InitDevice,
        BringupState::CheckFirmware,
        BringupState::DeviceEnable,
        BringupState::CheckSensor,
        BringupState::CheckPsk,
        BringupState::WritePsk,
        BringupState::EstablishGtsConnection,
        BringupState::UpdateAllBase,
        BringupState::SetSleepMode,
    ];

    /// The state after this one, or `None` after the last.
    pub fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BringupState::InitDevice => "INIT_DEVICE",
            BringupState::CheckFirmware => "CHECK_FIRMWARE",
            BringupState::DeviceEnable => "DEVICE_ENABLE",
            BringupState::CheckSensor => "CHECK_SENSOR",
            BringupState::CheckPsk => "CHECK_PSK",
            BringupState::WritePsk => "WRITE_PSK",
            BringupState::EstablishGtsConnection => "ESTABLISH_GTS_CONNECTION",
            BringupState::UpdateAllBase => "UPDATE_ALL_BASE",
            BringupState::SetSleepMode => "SET_SLEEP_MODE",
        }
    }
}

impl fmt::Display for BringupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a successful step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Done,
    /// Nothing needed doing, e.g. the PSK was already provisioned.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub state: BringupState,
    pub outcome: StepOutcome,
}

/// State carried from one step to the next within a single run.
#[derive(Debug, Default)]
struct Session {
    firmware: String,
    chip_id: u32,
    calibration: Option<CalibrationParams>,
    psk_valid: bool,
    psk_written: bool,
    steps: Vec<StepRecord>,
}

/// A sensor that completed bring-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenedDevice {
    pub firmware: String,
    pub chip_id: u32,
    /// True when this run wrote the PSK.
    pub psk_provisioned: bool,
    pub calibration: CalibrationParams,
    pub steps: Vec<StepRecord>,
}

/// Drives one device through bring-up.
///
/// Callers must not run two bring-ups against the same physical device at
/// once; each `Bringup` owns its transport for that reason.
pub struct Bringup<T, C> {
    link: DeviceLink<T>,
    channel: C,
    config: BringupConfig,
}

impl<T: SensorTransport, C: SecureChannel> Bringup<T, C> {
    pub fn new(transport: T, channel: C, config: BringupConfig) -> Self {
        Self {
            link: DeviceLink::new(transport, config.timeouts.clone()),
            channel,
            config,
        }
    }

    pub fn config(&self) -> &BringupConfig {
        &self.config
    }

    pub fn link(&self) -> &DeviceLink<T> {
        &self.link
    }

    pub fn into_parts(self) -> (DeviceLink<T>, C) {
        (self.link, self.channel)
    }

    /// Run every state in order.
    ///
    /// Either the whole sequence succeeds and an [`OpenedDevice`] is
    /// returned, or the first failing state and its error are.
    pub fn run(&mut self) -> std::result::Result<OpenedDevice, BringupFailure> {
        let mut session = Session::default();
        let mut next = Some(BringupState::InitDevice);

        while let Some(state) = next {
            debug!(%state, "entering state");
            match self.step(state, &mut session) {
                Ok(outcome) => {
                    debug!(%state, ?outcome, "state complete");
                    session.steps.push(StepRecord { state, outcome });
                    next = state.next();
                }
                Err(error) => {
                    warn!(%state, %error, "bring-up aborted");
                    return Err(BringupFailure { state, error });
                }
            }
        }

        let calibration = session.calibration.ok_or(BringupFailure {
            state: BringupState::UpdateAllBase,
            error: BringupError::MissingCalibration,
        })?;
        info!(
            firmware = %session.firmware,
            chip_id = %format!("0x{:08x}", session.chip_id),
            "sensor ready"
        );
        Ok(OpenedDevice {
            firmware: session.firmware,
            chip_id: session.chip_id,
            psk_provisioned: session.psk_written,
            calibration,
            steps: session.steps,
        })
    }

    /// Put the sensor back to sleep outside of a bring-up run.
    pub fn sleep(&mut self) -> Result<()> {
        self.link.sleep()
    }

    fn step(&mut self, state: BringupState, session: &mut Session) -> Result<StepOutcome> {
        match state {
            BringupState::InitDevice => {
                self.link.empty_buffer()?;
                self.link.ping()?;
            }
            BringupState::CheckFirmware => {
                let version = self.link.firmware_version()?;
                if !self.config.accepts_firmware(&version) {
                    return Err(BringupError::UnsupportedFirmware { version });
                }
                info!(firmware = %version, "firmware supported");
                session.firmware = version;
            }
            BringupState::DeviceEnable => {
                self.link.reset()?;
                let chip_id = self.link.enable_chip()?;
                if chip_id >> 8 != self.config.chip_id_high {
                    return Err(BringupError::UnsupportedChip {
                        chip_id,
                        expected_high: self.config.chip_id_high,
                    });
                }
                session.chip_id = chip_id;
            }
            BringupState::CheckSensor => {
                let otp = self.link.read_otp()?;
                debug!(otp = %render_hex(&otp), "otp read");
                if !verify_otp(&otp, &OTP_HASH_TABLE) {
                    return Err(BringupError::OtpHashMismatch {
                        otp: render_hex(&otp),
                    });
                }
                let mut params = CalibrationParams::from_otp(&otp)?;
                if let Some(threshold) = self.config.image_threshold_override {
                    params.image_delta_threshold = threshold;
                }
                session.calibration = Some(params);
            }
            BringupState::CheckPsk => {
                let reply = self.link.read_production(PSK_DIGEST_READ_TYPE)?;
                let record = ProductionReadRecord::parse(&reply, PSK_DIGEST_READ_TYPE)?;
                session.psk_valid = psk_matches(&record.data, &expected_psk_digest());
                debug!(psk_valid = session.psk_valid, "psk checked");
            }
            BringupState::WritePsk => {
                if session.psk_valid {
                    return Ok(StepOutcome::Skipped);
                }
                let write =
                    ProductionWrite::new(PSK_WHITE_BOX_WRITE_TYPE, Bytes::from_static(&PSK_WHITE_BOX));
                let status = self.link.write_production(&write)?;
                if status != 0 {
                    return Err(BringupError::PskWriteFailed {
                        status: Some(status),
                    });
                }
                info!("psk provisioned");
                session.psk_written = true;
            }
            BringupState::EstablishGtsConnection => {
                self.channel
                    .establish(self.link.transport_mut())
                    .map_err(BringupError::SecureChannel)?;
            }
            BringupState::UpdateAllBase => self.update_all_base(session)?,
            BringupState::SetSleepMode => self.link.sleep()?,
        }
        Ok(StepOutcome::Done)
    }

    fn update_all_base(&mut self, session: &mut Session) -> Result<()> {
        let params = session
            .calibration
            .as_mut()
            .ok_or(BringupError::MissingCalibration)?;

        self.link
            .upload_config(&prepare_config(&self.config.factory_config))?;
        debug!("config uploaded");

        let fdt_on = self.link.fdt_base(true)?;
        let image_on = self.link.image(true)?;
        let fdt_off = self.link.fdt_base(false)?;
        check_fdt(1, &fdt_on, &fdt_off, params.fdt_delta_threshold)?;

        let image_off = self.link.image(false)?;
        if !image_is_valid(&image_on, &image_off, params.image_delta_threshold) {
            return Err(BringupError::InvalidBaseImage {
                mean_delta: mean_image_delta(&image_on, &image_off),
                threshold: params.image_delta_threshold,
            });
        }

        let fdt_on_again = self.link.fdt_base(true)?;
        check_fdt(2, &fdt_on_again, &fdt_off, params.fdt_delta_threshold)?;

        params.update_bases(generate_fdt_base(&fdt_on), image_on.to_vec());
        debug!(samples = params.fdt_base.len(), "calibration bases updated");
        Ok(())
    }
}

fn check_fdt(pass: u8, tx_on: &[u8], tx_off: &[u8], max_delta: u16) -> Result<()> {
    if fdt_base_is_valid(tx_on, tx_off, max_delta) {
        return Ok(());
    }
    Err(BringupError::InvalidFdtBaseline {
        pass,
        worst_delta: max_fdt_delta(tx_on, tx_off),
        max_delta,
    })
}
