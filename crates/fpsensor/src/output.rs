use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fpsensor::bringup::{CalibrationParams, StepRecord};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Result of a successful `open`.
#[derive(Serialize)]
pub struct OpenOutput<'a> {
    pub device: &'static str,
    pub full_name: &'static str,
    pub firmware: &'a str,
    pub chip_id: String,
    pub psk_provisioned: bool,
    pub calibration: &'a CalibrationParams,
    pub steps: &'a [StepRecord],
    /// False while the device still holds its calibration.
    pub closed: bool,
}

/// Offline OTP check.
#[derive(Serialize)]
pub struct OtpReport {
    pub len: usize,
    pub valid: bool,
    pub stored_checksum: Option<String>,
    pub computed_checksum: Option<String>,
    pub calibration: Option<CalibrationParams>,
}

/// One host session served by `emulate`.
#[derive(Serialize)]
pub struct SessionOutput {
    pub session: usize,
    pub commands: Vec<&'static str>,
    pub psk_written: bool,
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn field_table(rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value]);
    }
    table
}

fn calibration_rows(calibration: &CalibrationParams) -> Vec<(&'static str, String)> {
    vec![
        ("tcode", calibration.tcode.to_string()),
        ("fdt delta threshold", calibration.fdt_delta_threshold.to_string()),
        ("image delta threshold", calibration.image_delta_threshold.to_string()),
        ("delta down", calibration.delta_down.to_string()),
        ("delta up", calibration.delta_up.to_string()),
        ("delta nav", calibration.delta_nav.to_string()),
        ("dac h", format!("0x{:03x}", calibration.dac_h)),
        ("dac l", format!("0x{:03x}", calibration.dac_l)),
        ("fdt base words", calibration.fdt_base.len().to_string()),
    ]
}

pub fn print_open(out: &OpenOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut rows = vec![
                ("device", out.device.to_string()),
                ("firmware", out.firmware.to_string()),
                ("chip id", out.chip_id.clone()),
                ("psk provisioned", out.psk_provisioned.to_string()),
            ];
            rows.extend(calibration_rows(out.calibration));
            rows.push(("closed", out.closed.to_string()));
            println!("{}", field_table(rows));

            let mut steps = Table::new();
            steps
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STATE", "OUTCOME"]);
            for step in out.steps {
                steps.add_row(vec![step.state.to_string(), outcome_name(step)]);
            }
            println!("{steps}");
        }
        OutputFormat::Pretty => {
            println!("{} opened:", out.full_name);
            println!("  Firmware:         {}", out.firmware);
            println!("  Chip ID:          {}", out.chip_id);
            println!("  PSK provisioned:  {}", out.psk_provisioned);
            println!(
                "  Thresholds:       fdt={} image={}",
                out.calibration.fdt_delta_threshold, out.calibration.image_delta_threshold
            );
            let steps = out
                .steps
                .iter()
                .map(|step| format!("{} ({})", step.state, outcome_name(step)))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  Steps:            {steps}");
        }
        OutputFormat::Raw => println!("{}", out.firmware),
    }
}

pub fn print_otp_report(report: &OtpReport, format: OutputFormat) {
    let checksum = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut rows = vec![
                ("length", report.len.to_string()),
                ("valid", report.valid.to_string()),
                ("stored checksum", checksum(&report.stored_checksum)),
                ("computed checksum", checksum(&report.computed_checksum)),
            ];
            if let Some(calibration) = &report.calibration {
                rows.extend(calibration_rows(calibration));
            }
            println!("{}", field_table(rows));
        }
        OutputFormat::Pretty => {
            println!("OTP ({} bytes): {}", report.len, verdict(report.valid));
            println!(
                "  Checksum:         stored={} computed={}",
                checksum(&report.stored_checksum),
                checksum(&report.computed_checksum)
            );
            if let Some(calibration) = &report.calibration {
                for (field, value) in calibration_rows(calibration) {
                    println!("  {:<18}{value}", format!("{field}:"));
                }
            }
        }
        OutputFormat::Raw => println!("{}", verdict(report.valid)),
    }
}

pub fn print_session(out: &SessionOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SESSION", "COMMANDS", "PSK WRITTEN", "SEQUENCE"])
                .add_row(vec![
                    out.session.to_string(),
                    out.commands.len().to_string(),
                    out.psk_written.to_string(),
                    out.commands.join(" "),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "session={} commands={} psk_written={} sequence={}",
                out.session,
                out.commands.len(),
                out.psk_written,
                out.commands.join(",")
            );
        }
        OutputFormat::Raw => println!("{}", out.commands.join("\n")),
    }
}

fn outcome_name(step: &StepRecord) -> String {
    format!("{:?}", step.outcome).to_lowercase()
}

fn verdict(valid: bool) -> &'static str {
    if valid {
        "valid"
    } else {
        "invalid"
    }
}
