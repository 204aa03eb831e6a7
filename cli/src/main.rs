mod args;

use args::Args;
use clap::Parser;
use linkwatch::{ConsumerHandlers, FeedError, StreamConnectionManager};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::process::ExitCode;
use std::sync::{mpsc, Arc, Mutex};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = TermLogger::init(
        args.log_level(),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), FeedError> {
    let config = args.watcher_config().map_err(FeedError::InvalidInput)?;

    let (stopped_tx, stopped_rx) = mpsc::channel();
    let stopped_tx = Mutex::new(stopped_tx);
    let consumer = ConsumerHandlers::new()
        .with_link_found(|link| println!("{}", link))
        .with_status(|status| println!("[status] {}", status))
        .with_connected(|| log::debug!("Stream connected"))
        .with_disconnected(move || {
            if let Ok(sender) = stopped_tx.lock() {
                let _ = sender.send(());
            }
        });

    let manager = StreamConnectionManager::from_keys(&args.keys(), Arc::new(consumer), config)?;
    for account in args.watched_accounts() {
        manager.add_account(&account)?;
    }
    for keyword in &args.keywords {
        manager.add_keyword(keyword)?;
    }
    if args.filter {
        manager.enable_keyword_filtering();
    }

    manager.start_streaming()?;
    log::info!(
        "Watching {} for links (Ctrl+C to quit)",
        manager
            .accounts()
            .iter()
            .map(|account| format!("@{}", account))
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Blocks until the feed shuts itself down
    let _ = stopped_rx.recv();
    log::info!("Feed shut down");
    Ok(())
}
