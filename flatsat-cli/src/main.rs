use std::env;
use std::fs;
use std::io::{self, Read, Write};

use anyhow::{anyhow, Error};
use clap::{values_t, App, AppSettings, Arg, ArgMatches, SubCommand};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use flatsat::container::{self, Container};
use flatsat::{SolverConfig, SolverConfigUpdate};

mod inspect;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stderr)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("FLATSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is flatsat {}", env!("FLATSAT_VERSION"));
    info!(
        "  {} build - {}",
        env!("FLATSAT_PROFILE"),
        env!("FLATSAT_RUSTC_VERSION")
    );
}

/// Reads a container from a file or stdin.
pub(crate) fn read_input(path: Option<&str>) -> Result<Container, Error> {
    Ok(match path {
        Some(path) => container::read_file(path)?,
        None => {
            info!("Reading from stdin");
            let stdin = io::stdin();
            let locked_stdin = stdin.lock();
            container::read_from_stream(locked_stdin)?
        }
    })
}

fn convert_args() -> App<'static, 'static> {
    SubCommand::with_name("convert")
        .about("Rewrite a container, changing its compression")
        .arg_from_usage("<INPUT> 'The container to read'")
        .arg_from_usage("<OUTPUT> 'The container to write'")
        .arg_from_usage("--compress 'Write a gzip compressed container'")
}

fn convert_main(matches: &ArgMatches) -> Result<i32, Error> {
    let container = read_input(matches.value_of("INPUT"))?;
    let output = matches
        .value_of("OUTPUT")
        .ok_or_else(|| anyhow!("missing output file"))?;
    container::write_file(output, &container, matches.is_present("compress"))?;
    Ok(0)
}

fn configure_args() -> App<'static, 'static> {
    SubCommand::with_name("configure")
        .about("Change the engine configuration stored in a snapshot")
        .arg_from_usage("[INPUT] 'The snapshot container to read'")
        .arg_from_usage("[OUTPUT] 'The snapshot container to write'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read parameters from configuration file'")
        .arg(
            Arg::from_usage("[config-option] -C --config-option")
                .value_name("OPTION>=<VALUE")
                .help(
                    "Specify a single config option, see 'flatsat configure -C help' for a list \
                     of options.",
                )
                .multiple(true)
                .number_of_values(1),
        )
        .arg_from_usage("--compress 'Write a gzip compressed container'")
}

fn configure_main(matches: &ArgMatches) -> Result<i32, Error> {
    let config_options = values_t!(matches, "config-option", String).unwrap_or_default();

    if config_options.iter().any(|option| option == "help") {
        print!("{}", SolverConfig::help());
        return Ok(0);
    }

    let (input, output) = match (matches.value_of("INPUT"), matches.value_of("OUTPUT")) {
        (Some(input), Some(output)) => (input, output),
        _ => return Err(anyhow!("configure needs an input and an output file")),
    };

    let mut config_update = SolverConfigUpdate::new();

    if let Some(config_path) = matches.value_of("config-file") {
        let mut config_contents = String::new();
        fs::File::open(config_path)?.read_to_string(&mut config_contents)?;

        config_update.merge(toml::from_str(&config_contents)?);
    }

    for config_option in config_options {
        config_update.merge(toml::from_str(&config_option)?);
    }

    let mut container = container::read_file(input)?;

    match &mut container {
        Container::Snapshot(snapshot) => config_update.apply(&mut snapshot.config),
        other => {
            return Err(anyhow!(
                "expected an engine snapshot, found {}",
                other.kind().name()
            ))
        }
    }

    container::write_file(output, &container, matches.is_present("compress"))?;
    Ok(0)
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("flatsat")
        .version(env!("FLATSAT_VERSION"))
        .about("Inspect and rewrite flatsat containers")
        .setting(AppSettings::DisableHelpSubcommand)
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(inspect::inspect_args())
        .subcommand(convert_args())
        .subcommand(configure_args())
        .get_matches();

    init_logging();
    banner();

    match matches.subcommand() {
        ("inspect", Some(matches)) => inspect::inspect_main(matches),
        ("convert", Some(matches)) => convert_main(matches),
        ("configure", Some(matches)) => configure_main(matches),
        _ => unreachable!(),
    }
}
