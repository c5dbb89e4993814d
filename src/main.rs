use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use secure_logreg::config::JobConfig;
use secure_logreg::data::load_local_dataset;
use secure_logreg::network::ConnectedParty;
use secure_logreg::session::run_party;
use secure_logreg::training::gd::GradientDescent;

#[derive(Parser)]
#[command(about = "Trains a logistic regression on data that is split among three parties")]
struct Cli {
    #[arg(long, value_name = "FILE", help = "The job file of this party")]
    config: PathBuf,

    #[arg(long, value_name = "FILE", conflicts_with = "response", help = "CSV file with the covariates held by this party")]
    covariates: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "CSV file with the labels held by this party")]
    response: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Where to write the JSON result. Default: stdout")]
    output: Option<PathBuf>,

    #[arg(long, short, help = "Log protocol details")]
    verbose: bool,
}

fn run(cli: Cli) -> Result<(), String> {
    let job = JobConfig::from_file(&cli.config).map_err(|err| err.to_string())?;
    let params = job.session_params().map_err(|err| err.to_string())?;
    let network = job.network_config().map_err(|err| err.to_string())?;
    let data = load_local_dataset(cli.covariates.as_deref(), cli.response.as_deref())
        .map_err(|err| err.to_string())?;
    log::info!(
        "P{}: {} local samples, connecting to the other parties",
        job.party_index,
        data.len()
    );

    let connected = ConnectedParty::bind_and_connect(job.party_index, network, Some(job.timeout()))
        .map_err(|err| format!("cannot connect to the other parties: {}", err))?;
    let output = run_party(connected, &params, &data, &GradientDescent).map_err(|err| err.to_string())?;

    let writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(File::create(path).map_err(|err| err.to_string())?),
        None => Box::new(io::stdout()),
    };
    serde_json::to_writer_pretty(writer, &output).map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
