use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use structopt::StructOpt;

use photometry::build_atlas::{build_atlas_with_params, BuildAtlasParams};
use photometry::estimate::{estimate_with_params, EstimateParams};

#[derive(StructOpt)]
#[structopt(about = "Fitsme face photometry estimator")]
struct Opts {
    #[structopt(
        help = "Logging level (off, error, warn, info, debug, trace)",
        long,
        default_value = "info"
    )]
    log_level: LevelFilter,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    BuildAtlas(BuildAtlasParams),
    Estimate(EstimateParams),
}

fn main() {
    let opts = Opts::from_args();

    if let Err(err) = TermLogger::init(
        opts.log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("warning: failed to initialize logger ({})", err);
    }

    let res = match &opts.command {
        Command::BuildAtlas(params) => build_atlas_with_params(params),
        Command::Estimate(params) => estimate_with_params(params),
    };

    if let Err(err) = res {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
