use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fpsensor::bringup::{EmulatorProfile, SensorEmulator};
use fpsensor::proto::command::PRODUCTION_WRITE;
use fpsensor::proto::command_name;
use fpsensor::transport::{PacketStream, SensorSocket};
use tracing::{info, warn};

use crate::cmd::EmulateArgs;
use crate::exit::{io_error, transport_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS};
use crate::output::{print_session, OutputFormat, SessionOutput};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub fn run(args: EmulateArgs, format: OutputFormat) -> CliResult<i32> {
    let profile = load_profile(&args)?;
    let socket =
        SensorSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    socket
        .set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    // One emulator for every session, so provisioning sticks across opens.
    let mut emulator = SensorEmulator::new(profile);
    let mut sessions = 0usize;

    while running.load(Ordering::SeqCst) {
        let stream = match socket.try_accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };

        sessions = sessions.saturating_add(1);
        let first = emulator.received().len();
        let mut link = PacketStream::new(stream);
        if let Err(err) = emulator.serve(&mut link, &running) {
            warn!(session = sessions, error = %err, "session ended abnormally");
        }

        let served = &emulator.received()[first..];
        info!(session = sessions, commands = served.len(), "session finished");
        print_session(
            &SessionOutput {
                session: sessions,
                commands: served.iter().map(|cmd| command_name(*cmd)).collect(),
                psk_written: served.contains(&PRODUCTION_WRITE),
            },
            format,
        );

        if args.count.is_some_and(|count| sessions >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}

fn load_profile(args: &EmulateArgs) -> CliResult<EmulatorProfile> {
    if let Some(path) = &args.profile {
        let raw = std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return serde_json::from_slice(&raw).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("invalid profile {}: {err}", path.display()),
            )
        });
    }

    let mut profile = EmulatorProfile::default();
    if let Some(firmware) = &args.firmware {
        profile.firmware = firmware.clone();
    }
    if let Some(chip_id) = args.chip_id {
        profile.chip_id = chip_id;
    }
    if args.unprovisioned {
        profile.psk_digest = vec![0; profile.psk_digest.len()];
    }
    Ok(profile)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
