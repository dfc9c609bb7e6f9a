use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::{Duration, Instant};

use fpsensor::bringup::{Bringup, BringupConfig, ImageDevice, PreEstablished};
use fpsensor::transport::{SensorSocket, StreamTransport, TransportError};
use tracing::info;

use crate::cmd::{parse_duration, OpenArgs};
use crate::exit::{
    bringup_error, config_error, device_error, transport_error, CliError, CliResult, SUCCESS,
    TIMEOUT,
};
use crate::output::{print_open, OpenOutput, OutputFormat};

pub fn run(args: OpenArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = match &args.config {
        Some(path) => BringupConfig::from_json_file(path).map_err(config_error)?,
        None => BringupConfig::default(),
    };

    let transport = connect_with_timeout(&args.path, timeout)?;
    // The socket link is already private to this host; no handshake runs over it.
    let mut device = ImageDevice::new(Bringup::new(transport, PreEstablished, config));

    let opened = device
        .try_open()
        .map_err(|failure| bringup_error("open failed", failure))?
        .clone();

    // Bring-up already ends in SET_SLEEP_MODE; closing additionally drops
    // the session's calibration.
    if args.close {
        device
            .try_close()
            .map_err(|err| device_error("close failed", err))?;
        info!("device closed");
    }

    let descriptor = device.descriptor();
    let out = OpenOutput {
        device: descriptor.id,
        full_name: descriptor.full_name,
        firmware: &opened.firmware,
        chip_id: format!("0x{:08x}", opened.chip_id),
        psk_provisioned: opened.psk_provisioned,
        calibration: &opened.calibration,
        steps: &opened.steps,
        closed: !device.is_open(),
    };
    print_open(&out, format);
    Ok(SUCCESS)
}

fn connect_with_timeout(
    path: &Path,
    timeout: Duration,
) -> CliResult<StreamTransport<UnixStream>> {
    let start = Instant::now();
    loop {
        match SensorSocket::connect(path) {
            Ok(transport) => return Ok(transport),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(transport_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}: {err}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &TransportError) -> bool {
    match err {
        TransportError::Connect { source, .. } => matches!(
            source.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
        ),
        _ => false,
    }
}
