//! reliable-session demo
//!
//! Runs a reliable session over a simulated binder:
//!
//! ```text
//!   orchestrator.open ──► CreateSequence (establishing requestor)
//!        │
//!        ▼
//!   N correlated requests ──► Guard admission ──► requestor retries
//!        │                      keep-alive timer ticks meanwhile
//!        ▼
//!   one best-effort fault ──► send fault helper (drained on close)
//!        │
//!        ▼
//!   guard.close ──► orchestrator.close ──► TerminateSequence, binder close
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;

use reliable_session::channel::binder::{ChannelBinder, MaskingMode};
use reliable_session::channel::output::ReliableOutput;
use reliable_session::config::{load_config, ReliableSessionConfig};
use reliable_session::fault::{FaultHelper, SendFaultHelper, SendFaultSender};
use reliable_session::observability::{logging, metrics};
use reliable_session::requestor::EmbeddedReply;
use reliable_session::{
    Guard, InterruptibleTimer, Message, ReliableSession, RequestReliableRequestor, RequestTemplate, RetryPolicy,
    SessionOrchestrator, SessionResult, SimulatedBinder,
};

#[derive(Parser)]
#[command(name = "reliable-session")]
#[command(about = "Drive a reliable session over a simulated transport", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of correlated requests to issue
    #[arg(short = 'n', long, default_value_t = 8)]
    requests: u32,

    /// Budget for each request
    #[arg(long, default_value_t = 2_000)]
    timeout_ms: u64,

    /// Override the simulated message loss rate
    #[arg(long)]
    drop_rate: Option<f64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    requests: u32,
    succeeded: u32,
    timed_out: u32,
    failed: u32,
    admission_retries: u32,
    keepalive_ticks: u32,
    transmissions: u32,
    handled_errors: usize,
    fault_sent: bool,
}

/// Establishes with CreateSequence and ends with TerminateSequence.
struct SimulatedSession {
    binder: Arc<dyn ChannelBinder>,
    config: ReliableSessionConfig,
}

#[async_trait]
impl ReliableSession for SimulatedSession {
    async fn open(&self, timeout: Duration) -> SessionResult<()> {
        let requestor = RequestReliableRequestor::new(
            self.binder.clone(),
            EmbeddedReply::default(),
            RequestTemplate::new("urn:rm/CreateSequence", Vec::new()),
        )
        .with_policy(RetryPolicy::Establishing)
        .configured(&self.config.requestor);
        requestor.set_request_reply_pattern()?;
        requestor.request(timeout).await?;
        Ok(())
    }

    async fn close(&self, timeout: Duration) -> SessionResult<()> {
        let output = ReliableOutput::new(self.binder.clone(), MaskingMode::Handled).save_handled(true);
        let outcome = output
            .send(Message::new("urn:rm/TerminateSequence", Vec::new()), timeout)
            .await?;
        if let Some(error) = outcome.handled {
            tracing::debug!(error = %error, "TerminateSequence lost");
        }
        Ok(())
    }

    fn abort(&self) {
        tracing::debug!("Simulated session aborted");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ReliableSessionConfig::default(),
    };
    if let Some(drop_rate) = cli.drop_rate {
        config.simulation.drop_rate = drop_rate;
    }

    logging::init_logging(&config.observability)?;
    metrics::set_enabled(config.observability.metrics_enabled);

    tracing::info!(
        requests = cli.requests,
        timeout_ms = cli.timeout_ms,
        drop_rate = config.simulation.drop_rate,
        max_in_flight = config.guard.max_in_flight,
        "reliable-session demo starting"
    );

    let simulated = Arc::new(SimulatedBinder::from_config(&config.simulation));
    let binder: Arc<dyn ChannelBinder> = simulated.clone();
    let session = Arc::new(SimulatedSession {
        binder: binder.clone(),
        config: config.clone(),
    });
    let orchestrator = SessionOrchestrator::new(binder.clone(), session);
    orchestrator.open(config.session.open_timeout()).await?;

    let ticks = Arc::new(AtomicU32::new(0));
    let keepalive = {
        let ticks = ticks.clone();
        InterruptibleTimer::new(config.requestor.iteration() / 4, move || {
            ticks.fetch_add(1, Ordering::Relaxed);
        })?
    };
    keepalive.set_default();

    let guard = Arc::new(Guard::new(config.guard.max_in_flight));
    let timeout = Duration::from_millis(cli.timeout_ms);
    let mut tasks = Vec::with_capacity(cli.requests as usize);

    for i in 0..cli.requests {
        let binder = binder.clone();
        let guard = guard.clone();
        let requestor_config = config.requestor.clone();

        tasks.push(tokio::spawn(async move {
            let mut retries = 0;
            let _permit = loop {
                if let Some(permit) = guard.try_enter() {
                    break permit;
                }
                retries += 1;
                tokio::time::sleep(Duration::from_millis(5)).await;
            };

            let requestor = RequestReliableRequestor::new(
                binder,
                EmbeddedReply::default(),
                RequestTemplate::new("urn:demo/Echo", format!("request {}", i).into_bytes()),
            )
            .configured(&requestor_config);
            let result = match requestor.set_request_reply_pattern() {
                Ok(_) => requestor.request(timeout).await,
                Err(error) => Err(error),
            };
            (result, retries)
        }));
    }

    let mut summary = Summary {
        requests: cli.requests,
        ..Default::default()
    };

    for task in tasks {
        let (result, retries) = task.await?;
        summary.admission_retries += retries;
        match result {
            Ok(_) => summary.succeeded += 1,
            Err(error) if error.is_timeout() => summary.timed_out += 1,
            Err(error) => {
                tracing::warn!(error = %error, "Request failed");
                summary.failed += 1;
            }
        }
        keepalive.set_if_not_set(config.requestor.iteration() / 4);
    }

    let fault_binder = Arc::new(SimulatedBinder::from_config(&config.simulation));
    fault_binder.open(config.session.open_timeout()).await?;
    let faults = SendFaultHelper::with_config(SendFaultSender, &config.faults);
    faults.send_fault_async(
        fault_binder.clone(),
        None,
        Message::new("urn:rm/SequenceTerminated", b"demo complete".to_vec()),
    );
    faults.close(config.faults.close_timeout()).await?;
    summary.fault_sent = !fault_binder.sent().is_empty();

    keepalive.abort();
    guard.close(config.session.close_timeout()).await?;
    orchestrator.close(config.session.close_timeout()).await?;

    summary.keepalive_ticks = ticks.load(Ordering::Relaxed);
    summary.transmissions = simulated.stats().requests.load(Ordering::Relaxed)
        + simulated.stats().sends.load(Ordering::Relaxed);
    summary.handled_errors = simulated.handled_errors().len();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("requests:          {}", summary.requests);
        println!("succeeded:         {}", summary.succeeded);
        println!("timed out:         {}", summary.timed_out);
        println!("failed:            {}", summary.failed);
        println!("admission retries: {}", summary.admission_retries);
        println!("keep-alive ticks:  {}", summary.keepalive_ticks);
        println!("transmissions:     {}", summary.transmissions);
        println!("handled errors:    {}", summary.handled_errors);
        println!("fault sent:        {}", summary.fault_sent);
    }

    tracing::info!("reliable-session demo complete");
    Ok(())
}
