//! CLI for wirebox: inspect the property keyspace an application would see.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use wirebox_rs::config::{self, PropertySource};
use wirebox_rs::{init_logging, AppError, ArgsSource, EnvSource, JsonSource, Properties};

#[derive(Parser)]
#[command(name = "wirebox")]
#[command(about = "Wirebox property CLI")]
struct Cli {
    /// JSON property file; later files override earlier ones.
    #[arg(long = "json", value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Prefix of environment overrides; empty to ignore the environment.
    #[arg(long, default_value = wirebox_rs::config::DEFAULT_ENV_PREFIX)]
    env_prefix: String,

    #[arg(long, default_value = "warn")]
    log: String,

    #[command(flatten)]
    defines: ArgsSource,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every key with its resolved value.
    Keys,
    /// Resolve a string with `${key:=default}` placeholders.
    Resolve {
        template: String,
    },
    /// Evaluate a predicate over the keys, e.g. `mode == "prod" && workers > 2`.
    Eval {
        expr: String,
    },
}

fn load(cli: &Cli) -> Result<Properties, AppError> {
    let files = cli
        .files
        .iter()
        .map(JsonSource::from_file)
        .collect::<Result<Vec<_>, _>>()?;
    let env = (!cli.env_prefix.is_empty()).then(|| EnvSource::with_prefix(&cli.env_prefix));
    let sources = files
        .iter()
        .map(|f| f as &dyn PropertySource)
        .chain(env.as_ref().map(|e| e as &dyn PropertySource))
        .chain(std::iter::once(&cli.defines as &dyn PropertySource));
    config::load(sources)
}

fn run(cli: Cli) -> Result<(), AppError> {
    init_logging(&cli.log)?;
    let props = load(&cli)?;
    match cli.command {
        Commands::Keys => {
            for key in props.keys() {
                match props.resolve(props.get(&key).unwrap_or_default()) {
                    Ok(value) => println!("{}={}", key, value),
                    Err(e) => println!("{}=<{}>", key, e),
                }
            }
        }
        Commands::Resolve { template } => println!("{}", props.resolve(&template)?),
        Commands::Eval { expr } => println!("{}", props.eval(&expr)?),
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
