//! Call monitor orchestration
//!
//! Places the synthetic call, starts the probe loops of both parties and the
//! accumulator, and tears everything down on shutdown.

use std::time::Duration;

use rtpmon_infra_common::{CancellationToken, TaskManager};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clock;
use crate::config::MonitorConfig;
use crate::control::{CallSession, ControlChannel, NegotiationState, Negotiator};
use crate::error::{Error, Result};
use crate::party::Party;
use crate::rtp::{generate_ssrc_pair, run_receiver, run_sender, ProbeTemplate};
use crate::stats::{run_accumulator, DeliveryEvent, HistoryWindow, StatsAccumulator};

/// Capacity of each receiver-to-accumulator channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long stopping tasks are waited for before being aborted
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Entry point of the monitor
pub struct CallMonitor;

impl CallMonitor {
    /// Negotiate the call and start probing.
    ///
    /// Closed intervals are pushed into `window`; keep a
    /// [`WindowReader`](crate::stats::WindowReader) taken from it beforehand
    /// to read them.
    pub async fn start(config: MonitorConfig, window: HistoryWindow) -> Result<RunningMonitor> {
        config.validate()?;
        if window.capacity() != config.history.capacity || window.step() != config.history.step {
            return Err(Error::Config(format!(
                "history window holds {} step {}, configuration asks for {} step {}",
                window.capacity(),
                window.step(),
                config.history.capacity,
                config.history.step
            )));
        }

        let control = ControlChannel::connect(
            &config.relay.host,
            config.relay.port,
            config.relay.reply_timeout(),
        )
        .await?;
        let mut negotiator = Negotiator::new(control, CallSession::generate(), config.call.clone());
        negotiator.negotiate().await?;

        let tasks = TaskManager::new("call-monitor").with_shutdown_timeout(TASK_SHUTDOWN_TIMEOUT);
        let ssrcs = generate_ssrc_pair();

        if let Err(e) = spawn_probes(&config, &negotiator, &tasks, ssrcs, window) {
            tasks.shutdown().await;
            if let Err(delete_err) = negotiator.delete().await {
                warn!(error = %delete_err, "cleanup delete failed");
            }
            return Err(e);
        }

        info!(
            call_id = %negotiator.session().call_id,
            ssrc_a = ssrcs.0,
            ssrc_b = ssrcs.1,
            primary = %config.history.primary_party,
            "monitor running"
        );

        Ok(RunningMonitor { negotiator, tasks })
    }
}

fn spawn_probes(
    config: &MonitorConfig,
    negotiator: &Negotiator,
    tasks: &TaskManager,
    (ssrc_a, ssrc_b): (u32, u32),
    window: HistoryWindow,
) -> Result<()> {
    let (tx_a, rx_a) = mpsc::channel::<DeliveryEvent>(EVENT_CHANNEL_CAPACITY);
    let (tx_b, rx_b) = mpsc::channel::<DeliveryEvent>(EVENT_CHANNEL_CAPACITY);

    let parties = [(Party::A, ssrc_a, ssrc_b, tx_a), (Party::B, ssrc_b, ssrc_a, tx_b)];
    for (party, own_ssrc, peer_ssrc, events) in parties {
        let socket = negotiator
            .transport(party)
            .cloned()
            .ok_or_else(|| Error::InvalidState(format!("party {} has no transport", party)))?;
        let template = ProbeTemplate::new(party, config.rtp.payload_type, own_ssrc, config.rtp.payload_size);

        tasks.spawn(
            format!("sender-{}", party),
            run_sender(party, socket.clone(), template, config.rtp.ptime()),
        )?;
        tasks.spawn(
            format!("receiver-{}", party),
            run_receiver(party, socket, peer_ssrc, events),
        )?;
    }

    let (primary, secondary) = match config.history.primary_party {
        Party::A => (rx_a, rx_b),
        Party::B => (rx_b, rx_a),
    };
    let accumulator = StatsAccumulator::new(window, config.history.interval_secs, clock::unix_time());
    tasks.spawn("accumulator", async move {
        run_accumulator(accumulator, primary, secondary).await;
    })?;
    Ok(())
}

/// A negotiated call with its probe loops running
pub struct RunningMonitor {
    negotiator: Negotiator,
    tasks: TaskManager,
}

impl RunningMonitor {
    /// Identifiers of the call on the relay
    pub fn session(&self) -> &CallSession {
        self.negotiator.session()
    }

    /// Run until `shutdown` is cancelled, then stop
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        info!("shutdown requested");
        self.stop().await
    }

    /// Stop the probe loops, then delete the call on the relay
    pub async fn stop(mut self) -> Result<()> {
        let report = self.tasks.shutdown().await;
        info!(completed = report.completed, aborted = report.aborted, "probe tasks stopped");

        if self.negotiator.state() == NegotiationState::Active {
            self.negotiator.delete().await?;
        }
        Ok(())
    }
}
