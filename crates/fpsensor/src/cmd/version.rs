use fpsensor::bringup::{BringupConfig, GOODIX_5395};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("fpsensor {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let defaults = BringupConfig::default();
    let fields = [
        ("name", "fpsensor".to_string()),
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        ("build_target", build_env(option_env!("FPSENSOR_BUILD_TARGET"))),
        ("build_profile", build_env(option_env!("FPSENSOR_BUILD_PROFILE"))),
        ("device", format!("{} ({})", GOODIX_5395.full_name, GOODIX_5395.id)),
        (
            "image",
            format!("{}x{}", GOODIX_5395.img_width, GOODIX_5395.img_height),
        ),
        ("chip_id_high", format!("0x{:04x}", defaults.chip_id_high)),
        ("accepted_firmware", defaults.accepted_firmware.join(", ")),
    ];
    for (field, value) in fields {
        println!("{field}: {value}");
    }

    Ok(SUCCESS)
}

fn build_env(value: Option<&'static str>) -> String {
    value.unwrap_or("unknown").to_string()
}
