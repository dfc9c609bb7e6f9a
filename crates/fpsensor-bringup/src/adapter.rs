//! Host-facing image-device adapter.
//!
//! A fingerprint host sees a device through a descriptor and a pair of
//! open/close calls that report completion through a callback. This adapter
//! runs the bring-up behind `open` and keeps the resulting calibration for
//! the lifetime of the open device.

use serde::Serialize;
use tracing::debug;

use fpsensor_transport::SensorTransport;

use crate::calibration::CalibrationParams;
use crate::constants::{BZ3_THRESHOLD, SENSOR_HEIGHT, SENSOR_WIDTH};
use crate::error::{BringupError, BringupFailure, Result};
use crate::secure::SecureChannel;
use crate::sequencer::{Bringup, OpenedDevice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Press,
    Swipe,
}

/// Static identification and imaging properties of a device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub id: &'static str,
    pub full_name: &'static str,
    pub img_width: usize,
    pub img_height: usize,
    pub bz3_threshold: u32,
    pub scan_type: ScanType,
    pub supports_verify: bool,
}

pub const GOODIX_5395: DeviceDescriptor = DeviceDescriptor {
    id: "goodixtls5395",
    full_name: "Goodix TLS Fingerprint Sensor 5395",
    img_width: SENSOR_WIDTH,
    img_height: SENSOR_HEIGHT,
    bz3_threshold: BZ3_THRESHOLD,
    scan_type: ScanType::Press,
    supports_verify: false,
};

/// An image device whose `open` is a full bring-up.
///
/// Open either fully succeeds, exposing an [`OpenedDevice`], or fails and
/// exposes nothing.
pub struct ImageDevice<T, C> {
    descriptor: DeviceDescriptor,
    bringup: Bringup<T, C>,
    opened: Option<OpenedDevice>,
}

impl<T: SensorTransport, C: SecureChannel> ImageDevice<T, C> {
    pub fn new(bringup: Bringup<T, C>) -> Self {
        Self::with_descriptor(bringup, GOODIX_5395)
    }

    pub fn with_descriptor(bringup: Bringup<T, C>, descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            bringup,
            opened: None,
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn bringup(&self) -> &Bringup<T, C> {
        &self.bringup
    }

    pub fn is_open(&self) -> bool {
        self.opened.is_some()
    }

    pub fn calibration(&self) -> Option<&CalibrationParams> {
        self.opened.as_ref().map(|device| &device.calibration)
    }

    /// Open the device, running bring-up if it is not open yet.
    pub fn try_open(&mut self) -> std::result::Result<&OpenedDevice, BringupFailure> {
        let device = match self.opened.take() {
            Some(device) => device,
            None => self.bringup.run()?,
        };
        debug!(id = self.descriptor.id, "device open");
        Ok(&*self.opened.insert(device))
    }

    /// Open the device and report completion to `complete`.
    pub fn open<F>(&mut self, complete: F)
    where
        F: FnOnce(std::result::Result<&OpenedDevice, &BringupFailure>),
    {
        match self.try_open() {
            Ok(device) => complete(Ok(device)),
            Err(failure) => complete(Err(&failure)),
        }
    }

    /// Put the sensor to sleep and discard the session's calibration.
    ///
    /// The calibration is dropped even if the sleep command fails.
    pub fn try_close(&mut self) -> Result<()> {
        if self.opened.take().is_none() {
            return Ok(());
        }
        debug!(id = self.descriptor.id, "closing device");
        self.bringup.sleep()
    }

    pub fn close<F>(&mut self, complete: F)
    where
        F: FnOnce(std::result::Result<(), &BringupError>),
    {
        match self.try_close() {
            Ok(()) => complete(Ok(())),
            Err(err) => complete(Err(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use fpsensor_proto::command::SLEEP;

    use super::*;
    use crate::config::BringupConfig;
    use crate::emulator::{EmulatorProfile, LoopbackTransport};
    use crate::secure::PreEstablished;
    use crate::sequencer::BringupState;

    fn device(profile: EmulatorProfile) -> ImageDevice<LoopbackTransport, PreEstablished> {
        ImageDevice::new(Bringup::new(
            LoopbackTransport::new(profile),
            PreEstablished,
            BringupConfig::default(),
        ))
    }

    fn sleeps(device: &ImageDevice<LoopbackTransport, PreEstablished>) -> usize {
        device
            .bringup()
            .link()
            .transport()
            .sent_commands()
            .iter()
            .filter(|cmd| **cmd == SLEEP)
            .count()
    }

    #[test]
    fn descriptor_values() {
        assert_eq!(GOODIX_5395.id, "goodixtls5395");
        assert_eq!((GOODIX_5395.img_width, GOODIX_5395.img_height), (88, 108));
        assert_eq!(GOODIX_5395.bz3_threshold, 24);
        assert_eq!(GOODIX_5395.scan_type, ScanType::Press);
        assert!(!GOODIX_5395.supports_verify);
    }

    #[test]
    fn open_then_close() {
        let mut device = device(EmulatorProfile::default());

        let mut opened = false;
        device.open(|result| opened = result.is_ok());
        assert!(opened);
        assert!(device.is_open());
        assert!(device.calibration().is_some());

        let mut closed = false;
        device.close(|result| closed = result.is_ok());
        assert!(closed);
        assert!(!device.is_open());
        assert!(device.calibration().is_none());
        assert_eq!(sleeps(&device), 2);
    }

    #[test]
    fn reopen_does_not_rerun_bringup() {
        let mut device = device(EmulatorProfile::default());
        device.try_open().unwrap();
        let sent = device.bringup().link().transport().sent_commands().len();
        device.try_open().unwrap();
        assert_eq!(device.bringup().link().transport().sent_commands().len(), sent);
    }

    #[test]
    fn failed_open_exposes_nothing() {
        let mut profile = EmulatorProfile::default();
        profile.fdt_drift = 40;
        let mut device = device(profile);

        let mut failed_at = None;
        device.open(|result| failed_at = result.err().map(|failure| failure.state));
        assert_eq!(failed_at, Some(BringupState::UpdateAllBase));
        assert!(!device.is_open());
        assert!(device.calibration().is_none());

        device.try_close().unwrap();
        assert_eq!(sleeps(&device), 0);
    }
}
