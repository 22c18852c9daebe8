use anyhow::{anyhow, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use gpmetadump::backup;
use gpmetadump::config::DumpConfig;

struct CliArgs {
    dbname: Option<String>,
    output_dir: Option<String>,
    include_database: bool,
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --dbname <name> [--output-dir <dir>] [--create-db]\n\nOptions:\n  -d, --dbname <name>       database to back up (falls back to PGDATABASE)\n  -o, --output-dir <dir>    directory for the predata/postdata SQL files (default: .)\n      --create-db           emit a CREATE DATABASE statement in the predata file\n  -h, --help                show this help\n\nConnection parameters come from PGHOST, PGPORT, and PGUSER with the usual defaults."
    );
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut parsed = CliArgs { dbname: None, output_dir: None, include_database: false };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dbname" | "-d" => {
                i += 1;
                let val = args.get(i).ok_or_else(|| anyhow!("--dbname requires a value"))?;
                parsed.dbname = Some(val.clone());
            }
            "--output-dir" | "-o" => {
                i += 1;
                let val = args.get(i).ok_or_else(|| anyhow!("--output-dir requires a value"))?;
                parsed.output_dir = Some(val.clone());
            }
            "--create-db" => parsed.include_database = true,
            "--help" | "-h" => {
                print_usage(&args[0]);
                std::process::exit(0);
            }
            other => return Err(anyhow!("unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    let config = match DumpConfig::resolve(cli.dbname, cli.output_dir, cli.include_database) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };
    info!(
        "gpmetadump starting: dbname='{}', host={}, port={}, user='{}', output_dir='{}'",
        config.dbname, config.host, config.port, config.user, config.output_dir
    );

    match backup::run(&config).await {
        Ok(()) => {
            println!("Backup of database {} completed successfully", config.dbname);
        }
        Err(e) => {
            error!("backup failed: {}", e);
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}
