//! Correlated-k table builder.
//!
//! Gathers HELIOS-K k-distribution results into one `<species>.npz` table per species.

use std::{collections::BTreeMap, error::Error, path::PathBuf};

use chrono::NaiveDate;
use clap::{Arg, ArgMatches};
use env_logger::Env;
use log::info;
use strum::IntoEnumIterator;

use opacity_tables::{
    build_ktables,
    cmd_line::{
        bin_order, numbers_from_file, parsed_value, required_value, slice_range, split_key_value,
    },
    BinOrder, CommonCmdLineArgs, KTableConfig, OpacityErr, Provenance, DEFAULT_REPOSITORY,
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
    let orders: Vec<&'static str> = BinOrder::iter().map(|order| order.into()).collect();

    let app = CommonCmdLineArgs::new_app("ktables", "Build correlated-k tables.")
        .arg(
            Arg::with_name("species")
                .short("s")
                .long("species")
                .takes_value(true)
                .multiple(true)
                .required(true)
                .help("Species to process (e.g. H2O, CO2)."),
        )
        .arg(
            Arg::with_name("output-dir")
                .short("o")
                .long("output-dir")
                .takes_value(true)
                .default_value("kdistributions")
                .help("Directory the tables are written to."),
        )
        .arg(
            Arg::with_name("weights")
                .long("weights")
                .takes_value(true)
                .required(true)
                .help("File with the quadrature weights of the g-ordinates."),
        )
        .arg(
            Arg::with_name("wavelengths")
                .long("wavelengths")
                .takes_value(true)
                .required(true)
                .help("File with the wavelengths of the spectral bins in microns."),
        )
        .arg(
            Arg::with_name("bins")
                .long("bins")
                .takes_value(true)
                .help("Number of spectral bins.")
                .long_help(concat!(
                    "Number of spectral bins. Defaults to one less than the number of ",
                    "wavelengths, which are then the bin edges."
                )),
        )
        .arg(
            Arg::with_name("pressures")
                .long("pressures")
                .takes_value(true)
                .help("File with the pressures in bar the results must be on."),
        )
        .arg(
            Arg::with_name("bin-order")
                .long("bin-order")
                .takes_value(true)
                .possible_values(&orders)
                .default_value("descending")
                .help("How the results files are numbered relative to the output bins."),
        )
        .arg(
            Arg::with_name("split")
                .long("split")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Named wavelength subset, NAME=START:END, written to bins.npz.")
                .long_help(concat!(
                    "Named subset of the wavelengths written to bins.npz next to the tables, ",
                    "e.g. 'sol_wavl=:-2' or 'ir_wavl=9:'. Bounds may be empty or negative, ",
                    "negative bounds count back from the end. May be repeated."
                )),
        )
        .arg(
            Arg::with_name("commit")
                .long("commit")
                .takes_value(true)
                .help("Commit of the HELIOS-K setup used."),
        )
        .arg(
            Arg::with_name("repository")
                .long("repository")
                .takes_value(true)
                .default_value(DEFAULT_REPOSITORY)
                .help("Repository with the HELIOS-K setup used."),
        )
        .arg(
            Arg::with_name("date")
                .long("date")
                .takes_value(true)
                .help("Date the tables were made, YYYY-MM-DD. Defaults to today."),
        )
        .arg(
            Arg::with_name("creator")
                .long("creator")
                .takes_value(true)
                .required(true)
                .help("Who made the tables."),
        );

    let (common_args, matches) = CommonCmdLineArgs::matches(app)?;

    let config = build_config(&common_args, &matches)?;
    info!(
        "building {} tables in {}",
        config.species.len(),
        config.output_dir.display()
    );

    let report = build_ktables(&config)?;
    for (species, err) in &report.failed {
        println!("failed {}: {}", species, err);
    }
    info!(
        "done, {} tables written, {} failed",
        report.completed.len(),
        report.failed.len()
    );

    Ok(())
}

fn build_config(
    common_args: &CommonCmdLineArgs,
    matches: &ArgMatches,
) -> Result<KTableConfig, OpacityErr> {
    let missing = |name: &str| OpacityErr::InvalidConfig(format!("missing {}", name));

    let weights = numbers_from_file(matches, "weights")?.ok_or_else(|| missing("weights"))?;
    let wavelengths =
        numbers_from_file(matches, "wavelengths")?.ok_or_else(|| missing("wavelengths"))?;

    let n_bins = match parsed_value(matches, "bins")? {
        Some(n_bins) => n_bins,
        None => wavelengths
            .len()
            .checked_sub(1)
            .ok_or_else(|| missing("wavelengths"))?,
    };

    let mut wavelength_splits = BTreeMap::new();
    for arg in matches.values_of("split").into_iter().flatten() {
        let (name, slice) = split_key_value(arg, '=')?;
        let range = slice_range(slice, wavelengths.len())?;
        wavelength_splits.insert(name.to_owned(), wavelengths[range].to_vec());
    }

    let date = match matches.value_of("date") {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|err| {
            OpacityErr::InvalidConfig(format!("invalid date '{}': {}", date, err))
        })?,
        None => chrono::Local::now().date_naive(),
    };

    Ok(KTableConfig {
        species: matches
            .values_of("species")
            .into_iter()
            .flatten()
            .map(str::to_owned)
            .collect(),
        results_dir: common_args.results_dir().to_path_buf(),
        output_dir: required_value::<PathBuf>(matches, "output-dir")?,
        n_bins,
        weights,
        wavelengths,
        pressures: numbers_from_file(matches, "pressures")?,
        order: bin_order(matches, "bin-order")?,
        provenance: Provenance {
            repository: required_value(matches, "repository")?,
            commit: parsed_value(matches, "commit")?,
            date,
            creator: required_value(matches, "creator")?,
        },
        wavelength_splits,
        keep_going: common_args.keep_going(),
    })
}
