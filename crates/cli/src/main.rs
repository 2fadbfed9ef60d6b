//! rtpproxy-monitor: places a synthetic call through RTPproxy and serves
//! per-interval delivery statistics over HTTP.

mod args;

use std::process::ExitCode;

use clap::Parser;
use rtpmon_core::{CallMonitor, HistoryWindow};
use rtpmon_infra_common::logging::log_welcome;
use rtpmon_infra_common::{setup_logging, CancellationToken};
use rtpmon_web_console::StatusServer;
use tracing::{error, info, warn};

use crate::args::{status_addr, Args, APP_NAME};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logging = match args.logging_config() {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("{}: {:#}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = match setup_logging(logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "monitor stopped on fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.monitor_config()?;
    log_welcome(APP_NAME, env!("CARGO_PKG_VERSION"));
    info!(
        relay = %format!("{}:{}", config.relay.host, config.relay.port),
        interval_secs = config.history.interval_secs,
        capacity = config.history.capacity,
        "configuration loaded"
    );

    let window = HistoryWindow::new(config.history.capacity, config.history.step)?;
    let shutdown = CancellationToken::new();

    let server = StatusServer::bind(status_addr(&config), window.reader()).await?;
    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        let result = server.serve(server_shutdown.clone()).await;
        // a dead status page ends the run
        server_shutdown.cancel();
        result
    });

    let monitor = match CallMonitor::start(config, window).await {
        Ok(monitor) => monitor,
        Err(e) => {
            shutdown.cancel();
            let _ = server_task.await;
            return Err(e.into());
        }
    };

    tokio::spawn(wait_for_signal(shutdown.clone()));

    monitor.run_until(shutdown.clone()).await?;
    server_task.await??;
    info!("monitor stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => info!("interrupt received"),
        _ = terminate => info!("SIGTERM received"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
