#[macro_use]
extern crate macro_attr;
extern crate clap;

use clap::{arg, value_parser, ArgMatches, Command};

mod errors;
mod misc;
mod processing_stage_1;
mod processing_stage_2;
mod processing_stage_3;
mod processing_stage_4;
mod processing_stage_5;
mod schemes;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::info;

use crate::misc::parse_size;
use crate::processing_stage_1::load_registry;
use crate::processing_stage_2::load_size_overrides;
use crate::processing_stage_4::resolve;
use crate::processing_stage_5::write_overrides;

fn generate_override(
    input_files: &[PathBuf],
    output_file_name: &str,
    flash_size: u64,
    configs: &[PathBuf],
    app_override_file: &Path,
) -> Result<()> {
    info!("[1/5] loading image descriptions");

    let mut registry = load_registry(input_files, output_file_name)?;

    info!("[2/5] loading size overrides");

    registry.set_overrides(load_size_overrides(configs)?);

    info!("[3/5] ordering {} images", registry.len());
    info!("[4/5] assigning addresses in {:#x} bytes of flash", flash_size);

    resolve(&mut registry, flash_size)?;
    let app = registry.app();
    registry[&app].out_path = Some(app_override_file.to_path_buf());

    info!("[5/5] writing overrides");

    write_overrides(&registry)?;
    Ok(())
}

fn parse_size_arg(text: &str) -> Result<u64, String> {
    parse_size(text).map_err(|e| format!("invalid size `{}`: {}", text, e))
}

fn cli() -> Command<'static> {
    Command::new("partition-manager")
        .about("Parse given input configurations and generate override header files")
        .arg(
            arg!(input: -i --input <input_file> "image description files (YAML or JSON)")
                .required(false)
                .multiple_values(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(configs: -c --configs <config_file> "generated `autoconf.h` files")
                .required(false)
                .multiple_values(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(flash_size: -s --"flash-size" <size> "size of the flash of the device")
                .required(false)
                .value_parser(parse_size_arg),
        )
        .arg(
            arg!(output: -o --output <output_file> "output file name, stored next to each input")
                .required(false),
        )
        .arg(
            arg!(app_override_file: --"app-override-file" <path> "path of the app override header")
                .required(false)
                .value_parser(value_parser!(PathBuf)),
        )
}

fn run(matches: &ArgMatches) -> Result<()> {
    let input_files: Vec<PathBuf> = match matches.get_many::<PathBuf>("input") {
        Some(input_files) => input_files.cloned().collect(),
        None => {
            info!("No input, running self-tests");
            return self_test::run();
        }
    };

    let missing = |flag: &str| anyhow!("`{}` is required together with `--input`", flag);

    let configs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("configs")
        .map(|configs| configs.cloned().collect())
        .unwrap_or_default();
    let flash_size: u64 = *matches
        .get_one("flash_size")
        .ok_or_else(|| missing("--flash-size"))?;
    let output_file: &String = matches
        .get_one("output")
        .ok_or_else(|| missing("--output"))?;
    let app_override_file: &PathBuf = matches
        .get_one("app_override_file")
        .ok_or_else(|| missing("--app-override-file"))?;

    generate_override(
        &input_files,
        output_file,
        flash_size,
        &configs,
        app_override_file,
    )
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run(&cli().get_matches())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn arguments_are_parsed() {
        let matches = cli().get_matches_from([
            "partition-manager",
            "-i",
            "a.yml",
            "b.yml",
            "-s",
            "0x100000",
            "-o",
            "pm.h",
            "--app-override-file",
            "app.h",
        ]);

        let inputs: Vec<&PathBuf> = matches.get_many("input").unwrap().collect();
        assert_eq!(inputs, [&PathBuf::from("a.yml"), &PathBuf::from("b.yml")]);
        assert_eq!(matches.get_one::<u64>("flash_size"), Some(&0x100000));
        assert_eq!(matches.get_one::<String>("output").unwrap(), "pm.h");
        assert!(matches.get_many::<PathBuf>("configs").is_none());
    }

    #[test]
    fn bad_flash_size_is_rejected() {
        let result = cli().try_get_matches_from(["partition-manager", "-s", "lots"]);
        assert!(result.is_err());
    }

    #[test]
    fn input_requires_other_flags() {
        let matches = cli().get_matches_from(["partition-manager", "-i", "a.yml"]);
        let error = run(&matches).unwrap_err();
        assert!(error.to_string().contains("--flash-size"));
    }

    #[test]
    fn without_input_self_tests_run() {
        let matches = cli().get_matches_from(["partition-manager"]);
        run(&matches).unwrap();
    }

    #[test]
    fn overrides_are_generated() {
        let dir = tempfile::tempdir().unwrap();
        let mcuboot_dir = dir.path().join("mcuboot");
        let spm_dir = dir.path().join("spm");
        fs::create_dir(&mcuboot_dir).unwrap();
        fs::create_dir(&spm_dir).unwrap();

        let mcuboot = mcuboot_dir.join("pm.yml");
        let spm = spm_dir.join("pm.yml");
        let autoconf = dir.path().join("autoconf.h");
        let app_override = dir.path().join("app_override.h");

        fs::write(&mcuboot, "mcuboot:\n  placement:\n    before: [spm, app]\n").unwrap();
        fs::write(&spm, "spm:\n  placement:\n    before: [app]\n  size: 0x10000\n").unwrap();
        fs::write(
            &autoconf,
            "#define CONFIG_PARTITION_MANAGER_RESERVED_SPACE_MCUBOOT 0xc000\n",
        )
        .unwrap();

        generate_override(
            &[mcuboot, spm],
            "pm_config.h",
            0x100000,
            &[autoconf],
            &app_override,
        )
        .unwrap();

        let read = |path: PathBuf| fs::read_to_string(path).unwrap();
        assert_eq!(
            read(mcuboot_dir.join("pm_config.h")),
            "#undef CONFIG_FLASH_BASE_ADDRESS\n#define CONFIG_FLASH_BASE_ADDRESS 0x0\n"
        );
        assert_eq!(
            read(spm_dir.join("pm_config.h")),
            "#undef CONFIG_FLASH_BASE_ADDRESS\n#define CONFIG_FLASH_BASE_ADDRESS 0xc000\n"
        );
        assert_eq!(
            read(app_override),
            "#undef CONFIG_FLASH_BASE_ADDRESS\n#define CONFIG_FLASH_BASE_ADDRESS 0x1c000\n"
        );
    }
}
