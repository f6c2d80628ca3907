use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use appointments::cli::{handle_delete, handle_get, handle_list, handle_serve, Cli, Commands};
use appointments::config::AppConfig;

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_filter));

    let result = match cli.command {
        Commands::Serve { bind, database } => handle_serve(config, bind, database).await,
        Commands::List {
            database,
            status,
            json,
        } => handle_list(config, database, status, json).await,
        Commands::Get {
            id,
            if_none_match,
            database,
        } => handle_get(config, id, if_none_match, database).await,
        Commands::Delete {
            id,
            if_match,
            database,
        } => handle_delete(config, id, if_match, database).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
