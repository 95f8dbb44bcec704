use dynamo_sync::{logger, parse_args, CommandError, Dispatcher, SyncError};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const INTERACTIVE_DISPLAY_TICK: Duration = Duration::from_millis(500);
const PLAIN_DISPLAY_TICK: Duration = Duration::from_secs(15);
const CHECKPOINT_TICK: Duration = Duration::from_secs(20 * 60);

#[tokio::main]
async fn main() {
    logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let plans = match parse_args(&args) {
        Ok(plans) => plans,
        Err(CommandError::Exit) => std::process::exit(0),
        Err(CommandError::Usage(err)) => {
            eprintln!("[ERROR] {err:#}");
            std::process::exit(1);
        }
    };

    let dispatcher = match Dispatcher::new(plans).await {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(_) => std::process::exit(2),
    };

    if dispatcher.preflights().await.is_err() {
        std::process::exit(2);
    }

    display_status(&dispatcher);

    start_signal_handler(Arc::clone(&dispatcher));

    let tickers = CancellationToken::new();
    start_display_ticker(Arc::clone(&dispatcher), tickers.clone());
    start_checkpoint_ticker(Arc::clone(&dispatcher), tickers.clone());

    let result = dispatcher.run().await;

    tickers.cancel();
    display_status(&dispatcher);

    match result {
        Ok(()) => {}
        Err(SyncError::Cancelled) => {
            info!("[USER CANCELED]");
            eprintln!("[USER CANCELED]");
            std::process::exit(130);
        }
        Err(SyncError::OperationFailed) => {
            info!("[OPERATION FAILED]");
            eprintln!("[OPERATION FAILED]");
            std::process::exit(79);
        }
        Err(err) => {
            info!("[ERROR] {err:#}");
            eprintln!("[ERROR] {err:#}");
            std::process::exit(err.exit_code());
        }
    }
}

/// The first interrupt cancels every operation; later interrupts are
/// swallowed so a second Ctrl-C cannot kill in-flight writes mid-batch.
fn start_signal_handler(dispatcher: Arc<Dispatcher>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            dispatcher.cancel();
        }

        loop {
            let _ = tokio::signal::ctrl_c().await;
        }
    });
}

fn start_display_ticker(dispatcher: Arc<Dispatcher>, stop: CancellationToken) {
    let tick = if logger::interactive_mode() {
        INTERACTIVE_DISPLAY_TICK
    } else {
        PLAIN_DISPLAY_TICK
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => display_status(&dispatcher),
            }
        }
    });
}

fn start_checkpoint_ticker(dispatcher: Arc<Dispatcher>, stop: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHECKPOINT_TICK);
        // The first interval tick is immediate; checkpoints start one
        // period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => dispatcher.checkpoint(),
            }
        }
    });
}

fn display_status(dispatcher: &Dispatcher) {
    logger::clear_status();
    logger::status_print(dispatcher.statuses());
}
