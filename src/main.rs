use std::{path::Path, process::ExitCode};

use clap::Parser;
use hw_loader::{config::LoaderConfig, loader::PostgresLoader};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod.  Reads `.env/{env}.env`
    #[arg(short, long)]
    env: Option<String>,

    /// Only check that the database accepts connections
    #[arg(long)]
    health_check: bool,
}

/// 0 if the data was loaded (or the health check passed), 1 otherwise.
fn exit_status(success: bool) -> u8 {
    if success {
        0
    } else {
        1
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // before the logger, so RUST_LOG can come from the env file
    let dotenv = match &args.env {
        Some(env) => dotenvy::from_path(Path::new(format!(".env/{}.env", env).as_str())),
        None => {
            let _ = dotenvy::dotenv();
            Ok(())
        }
    };

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = dotenv {
        error!("Failed to read environment file: {}", e);
        return ExitCode::from(exit_status(false));
    }

    let config = match LoaderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(exit_status(false));
        }
    };
    info!("{:?}", config);
    let loader = PostgresLoader::new(config);

    let success = if args.health_check || loader.config.health_check {
        loader.health_check()
    } else {
        loader.load_data()
    };
    ExitCode::from(exit_status(success))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_statuses() {
        assert_eq!(exit_status(true), 0);
        assert_eq!(exit_status(false), 1);
    }

    #[test]
    fn parse_args() {
        let args = Args::try_parse_from(["hw_loader", "--env", "test", "--health-check"]).unwrap();
        assert_eq!(args.env.as_deref(), Some("test"));
        assert!(args.health_check);

        let args = Args::try_parse_from(["hw_loader"]).unwrap();
        assert_eq!(args.env, None);
        assert!(!args.health_check);
    }
}
