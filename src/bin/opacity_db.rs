//! Opacity database builder.
//!
//! Resamples HELIOS-K line-by-line results and CIA tables into an sqlite opacity database.

use std::{error::Error, path::PathBuf};

use clap::{Arg, ArgMatches};
use env_logger::Env;
use log::info;

use opacity_tables::{
    build_opacity_db,
    cmd_line::{numbers_from_file, parsed_value, required_value, split_key_value},
    CiaSource, CommonCmdLineArgs, DbBuildConfig, OpacityErr,
};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(ref e) = run() {
        println!("error: {}", e);

        let mut err: &dyn Error = e;
        while let Some(cause) = err.source() {
            println!("caused by: {}", cause);
            err = cause;
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), OpacityErr> {
    let app = CommonCmdLineArgs::new_app(
        "opacity_db",
        "Build a line-by-line and continuum opacity database.",
    )
    .arg(
        Arg::with_name("min-wavelength")
            .long("min-wavelength")
            .takes_value(true)
            .required(true)
            .help("Shortest wavelength of the output grid in microns."),
    )
    .arg(
        Arg::with_name("max-wavelength")
            .long("max-wavelength")
            .takes_value(true)
            .required(true)
            .help("Longest wavelength of the output grid in microns."),
    )
    .arg(
        Arg::with_name("resolution")
            .short("R")
            .long("resolution")
            .takes_value(true)
            .required(true)
            .help("Resolving power of the output grid."),
    )
    .arg(
        Arg::with_name("legacy-resolution")
            .long("legacy-resolution")
            .takes_value(true)
            .default_value("1e6")
            .help("Resolving power interpolated onto before decimating."),
    )
    .arg(
        Arg::with_name("bin-edges")
            .long("bin-edges")
            .takes_value(true)
            .required(true)
            .help("File with the edges of the line-by-line bins in 1/cm."),
    )
    .arg(
        Arg::with_name("points-per-bin")
            .long("points-per-bin")
            .takes_value(true)
            .default_value("100000")
            .help("Points computed in each line-by-line bin."),
    )
    .arg(
        Arg::with_name("temperatures")
            .long("temperatures")
            .takes_value(true)
            .help("File with the temperatures in K the results must be on."),
    )
    .arg(
        Arg::with_name("pressures")
            .long("pressures")
            .takes_value(true)
            .help("File with the pressures in bar of the results.")
            .long_help(concat!(
                "File with the pressures in bar of the results. When not given they are taken ",
                "from the first bin file of each molecule."
            )),
    )
    .arg(
        Arg::with_name("xsection")
            .long("xsection")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .help("Cross sections to add to a molecule, as <molecule>=<file>."),
    )
    .arg(
        Arg::with_name("cia")
            .long("cia")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .help("CIA table and its columns, as <file>:<pair>,<pair>,..."),
    )
    .arg(
        Arg::with_name("continuum-dump")
            .long("continuum-dump")
            .takes_value(true)
            .help("Also write the re-gridded CIA table to this file."),
    )
    .arg(
        Arg::with_name("output")
            .short("o")
            .long("output")
            .takes_value(true)
            .help("Database to create.")
            .long_help(concat!(
                "Database to create. Defaults to ",
                "'opacities_photochem_<min>_<max>_R<resolution>.db'."
            )),
    );

    let (common_args, matches) = CommonCmdLineArgs::matches(app)?;

    let config = build_config(&common_args, &matches)?;
    info!("building {}", config.db_path.display());

    let report = build_opacity_db(&config)?;
    for (molecule, err) in &report.failed {
        println!("failed {}: {}", molecule, err);
    }
    info!(
        "done, {} molecules stored, {} failed",
        report.completed.len(),
        report.failed.len()
    );

    Ok(())
}

fn build_config(
    common_args: &CommonCmdLineArgs,
    matches: &ArgMatches,
) -> Result<DbBuildConfig, OpacityErr> {
    let bin_edges = numbers_from_file(matches, "bin-edges")?
        .ok_or_else(|| OpacityErr::InvalidConfig("missing bin-edges".to_owned()))?;

    let mut config = DbBuildConfig::new(
        common_args.results_dir(),
        required_value(matches, "min-wavelength")?,
        required_value(matches, "max-wavelength")?,
        required_value(matches, "resolution")?,
        bin_edges,
    );

    config.old_resolution = required_value(matches, "legacy-resolution")?;
    config.points_per_bin = required_value(matches, "points-per-bin")?;
    config.temperatures = numbers_from_file(matches, "temperatures")?;
    config.pressures = numbers_from_file(matches, "pressures")?;
    config.continuum_dump = parsed_value(matches, "continuum-dump")?;
    config.keep_going = common_args.keep_going();

    if let Some(path) = parsed_value::<PathBuf>(matches, "output")? {
        config.db_path = path;
    }

    for arg in matches.values_of("xsection").into_iter().flatten() {
        let (molecule, path) = split_key_value(arg, '=')?;
        config
            .cross_sections
            .insert(molecule.to_owned(), PathBuf::from(path));
    }

    for arg in matches.values_of("cia").into_iter().flatten() {
        let (path, pairs) = split_key_value(arg, ':')?;
        config.cia_sources.push(CiaSource {
            path: PathBuf::from(path),
            pairs: pairs.split(',').map(|pair| pair.trim().to_owned()).collect(),
        });
    }

    Ok(config)
}
