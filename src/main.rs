use std::path::PathBuf;
use std::process::ExitCode;

use certcheck::output::{export, table};
use certcheck::{
    load_endpoints, scan, CertificateRecord, Config, ConfigError, InputError, Inspection,
    OutputFormat, Settings,
};
use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(name = "certcheck", version, about, long_about = None)]
struct Cli {
    /// Endpoints to check, as host:port
    #[arg(value_name = "HOST:PORT")]
    endpoints: Vec<String>,

    /// File with one host:port per line
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Print the connection transcript of every endpoint
    #[arg(short, long)]
    debug: bool,

    /// Connect and handshake timeout in seconds [default: 5]
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Number of endpoints checked concurrently [default: 8]
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Output format: table or json [default: table]
    #[arg(short, long, value_name = "FORMAT")]
    output: Option<String>,

    /// Also export the results as CSV to this path
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Sort results by host and port instead of input order
    #[arg(long)]
    sort: bool,

    /// Exit code to use when any certificate is expired
    #[arg(long, value_name = "CODE")]
    exit_code: Option<i32>,

    /// Configuration file [default: ./certcheck.toml if present]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Don't print the banner
    #[arg(long)]
    no_banner: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            endpoints: (!self.endpoints.is_empty()).then(|| self.endpoints.clone()),
            file: self.file.clone(),
            timeout: self.timeout,
            workers: self.workers,
            debug: self.debug.then_some(true),
            output: self.output.clone(),
            csv: self.csv.clone(),
            sort: self.sort.then_some(true),
            exit_code: self.exit_code,
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    let file_config = Config::discover(cli.config.as_deref())?.unwrap_or_default();
    file_config.merge_with(cli.to_config()).resolve()
}

fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn print_transcripts(inspections: &[Inspection]) {
    for inspection in inspections {
        println!("Debug Info for {}:", inspection.record.endpoint);
        for line in &inspection.transcript {
            println!("  {}", line);
        }
        println!();
    }
}

fn format_records(
    records: &[CertificateRecord],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Table => Ok(table::render(records)),
        OutputFormat::Json => serde_json::to_string_pretty(records),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.generate_config {
        print!("{}", Config::example_toml());
        return ExitCode::SUCCESS;
    }

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("certcheck: {}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logger(settings.debug);

    let endpoints = match load_endpoints(&settings) {
        Ok(endpoints) => endpoints,
        Err(InputError::NoEndpoints) => {
            let _ = Cli::command().print_help();
            return ExitCode::FAILURE;
        }
        Err(err) => {
            error!("{}", err);
            eprintln!("certcheck: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if settings.output == OutputFormat::Table && !cli.no_banner {
        eprintln!("{}", table::banner());
    }

    info!("checking {} endpoints", endpoints.len());
    let inspections = scan(&endpoints, &settings.scan);

    if settings.debug {
        print_transcripts(&inspections);
    }

    let records: Vec<CertificateRecord> = inspections.into_iter().map(|i| i.record).collect();
    match format_records(&records, settings.output) {
        Ok(rendered) => println!("{}", rendered),
        Err(err) => {
            eprintln!("certcheck: failed to render results: {}", err);
            return ExitCode::FAILURE;
        }
    }

    if let Some(path) = &settings.csv {
        match export::export_csv(path, &records) {
            Ok(()) => eprintln!("Results exported to {}", path.display()),
            Err(err) => {
                eprintln!("certcheck: {}", err);
                return ExitCode::FAILURE;
            }
        }
    }

    if settings.exit_code != 0 && records.iter().any(CertificateRecord::is_expired) {
        return ExitCode::from(u8::try_from(settings.exit_code).unwrap_or(1));
    }
    ExitCode::SUCCESS
}
