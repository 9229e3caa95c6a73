use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use avguard_core::{
    CommandGateway, GuardConfig, ScanState, engine::SimulatedEngine,
};
use clap::Args;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// File or directory to scan
    pub path: PathBuf,
    /// Override the debounce window, in milliseconds
    #[arg(long)]
    pub debounce_ms: Option<u64>,
    /// Override the simulated per-file scan delay, in milliseconds
    #[arg(long)]
    pub per_file_delay_ms: Option<u64>,
    /// Print each state as a JSON line instead of a summary
    #[arg(long)]
    pub json: bool,
}

/// Exit status reported when the settled scan found infected files.
const VIRUSES_FOUND: u8 = 1;

const SETTLE_SLACK: Duration = Duration::from_millis(250);

pub async fn run(args: ScanArgs, mut config: GuardConfig) -> Result<ExitCode> {
    if let Some(ms) = args.debounce_ms {
        config.debounce_window_ms = ms;
    }
    if let Some(ms) = args.per_file_delay_ms {
        config.simulator.per_file_delay_ms = ms;
    }
    config.validate()?;

    let engine = SimulatedEngine::new(config.simulator.clone());
    let gateway = CommandGateway::from_config(Arc::new(engine.clone()), &config)
        .context("failed to start the engine gateway")?;
    let printer = Printer { json: args.json };

    gateway
        .enable_protection()
        .await
        .context("failed to enable protection")?;
    if !gateway.is_protection_enabled().await? {
        warn!("engine does not report protection as enabled");
    }

    let scope = CancellationToken::new();
    let synthesizer = gateway.observe_scan_state(&scope);

    let target = args.path.display().to_string();
    gateway
        .start_scan(target.as_str())
        .await
        .with_context(|| format!("failed to start scan of {target}"))?;
    info!(path = %target, window_ms = config.debounce_window_ms, "watching scan");

    let mut observer = synthesizer.observe();
    let idle = engine.wait_idle();
    tokio::pin!(idle);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    // Re-armed when the engine goes idle; the settled state is due within
    // one debounce window.
    let grace = config.debounce_window() * 2 + SETTLE_SLACK;
    let deadline = time::sleep(grace);
    tokio::pin!(deadline);

    let mut last: Option<ScanState> = None;
    let mut settled: Option<ScanState> = None;
    let mut interrupted = false;

    loop {
        if let Some(settled) = &settled
            && last.as_ref() == Some(settled)
        {
            break;
        }

        tokio::select! {
            state = observer.next() => {
                let Some(state) = state else { break };
                printer.state(&state)?;
                last = Some(state);
            }
            () = &mut idle, if settled.is_none() => {
                settled = Some(synthesizer.current());
                deadline.as_mut().reset(Instant::now() + grace);
            }
            () = &mut deadline, if settled.is_some() => {
                if let Some(state) = &settled {
                    debug!(%state, "settled state not observed in time, printing it directly");
                    printer.state(state)?;
                }
                break;
            }
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                signal.context("failed to listen for ctrl-c")?;
                warn!("interrupted, stopping scan");
                if let Err(err) = gateway.stop_scan().await {
                    warn!(error = %err, "stop request failed");
                }
            }
        }
    }

    synthesizer.shutdown();
    let outcome = settled.unwrap_or_else(|| synthesizer.current());
    printer.summary(&outcome);

    if outcome.viruses().is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(VIRUSES_FOUND))
    }
}

#[derive(Debug, Clone, Copy)]
struct Printer {
    json: bool,
}

impl Printer {
    fn state(&self, state: &ScanState) -> Result<()> {
        if self.json {
            let line = serde_json::to_string(state)
                .context("failed to encode scan state")?;
            println!("{line}");
        } else {
            println!("{state}");
        }
        Ok(())
    }

    fn summary(&self, outcome: &ScanState) {
        if self.json {
            return;
        }
        for path in outcome.viruses() {
            println!("infected: {path}");
        }
        if outcome.viruses().is_empty() {
            println!("scan finished: no threats found");
        } else {
            println!(
                "scan finished: {} infected file(s)",
                outcome.viruses().len()
            );
        }
    }
}
