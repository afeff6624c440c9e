use clap::{Arg, Command};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Command::new("Tunelake Pipeline")
        .version("1.0")
        .about("Transforms raw song-catalog and activity-log JSON into star-schema parquet tables")
        .subcommand(
            Command::new("run")
                .about("Run the full ETL pipeline")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let config_path = run_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or("config/pipeline.toml");
            println!("Starting ETL pipeline with config: {}", config_path);

            match tunelake::run_pipeline(config_path).await {
                Ok(summary) => {
                    println!(
                        "Pipeline complete: {} songs, {} artists, {} users, {} time rows, {} songplays ({} events had no catalog match)",
                        summary.songs,
                        summary.artists,
                        summary.users,
                        summary.time,
                        summary.songplays,
                        summary.unmatched_events
                    );
                }
                Err(e) => {
                    eprintln!("Pipeline error: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
            process::exit(1);
        }
    }
}
