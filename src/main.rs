// anidex demo binary.
// Composition root: wires the HTTP client, snapshot store, and stats store.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use anidex::api::ApiClient;
use anidex::store::{FileSnapshotStore, StatsStore};

struct Args {
    refresh: bool,
    clear: bool,
    base_url: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        refresh: false,
        clear: false,
        base_url: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--refresh" => args.refresh = true,
            "--clear" => args.clear = true,
            "--base-url" => {
                let url = iter
                    .next()
                    .ok_or_else(|| "--base-url requires a value".to_string())?;
                args.base_url = Some(url);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("usage: anidex [--refresh] [--clear] [--base-url <url>]");
            return ExitCode::FAILURE;
        }
    };

    let client = match &args.base_url {
        Some(url) => ApiClient::with_base_url(url),
        None => ApiClient::new(),
    };
    let client = match client {
        Ok(client) => client,
        Err(err) => {
            error!("failed to build API client: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut store = StatsStore::new(client);
    if let Some(path) = FileSnapshotStore::default_path() {
        store = store.with_snapshot_store(FileSnapshotStore::new(path));
    }

    if args.clear {
        store.clear_cache();
        println!("stats cache cleared");
        return ExitCode::SUCCESS;
    }

    match store.get_stats(args.refresh).await {
        Ok(stats) => match serde_json::to_string_pretty(&stats) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("failed to render stats: {}", err);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!("failed to fetch stats: {}", err);
            ExitCode::FAILURE
        }
    }
}
