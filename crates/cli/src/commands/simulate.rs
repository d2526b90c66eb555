//! conduit simulate command
//!
//! Agents submit requests synchronously; a relay task completes them later
//! over a channel, the way an oracle callback would.

use super::load_core;
use clap::Args;
use conduit::{ConduitCore, ExecutionContext, FnHandler, StrategyAction, StrategyHandler};
use console::style;
use shared::{Address, Permission, RequestId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

const DEMO_STRATEGY: &str = "YIELD";
const DEMO_IMPLEMENTATION: Address = Address::repeat_byte(0x59);

#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Deployment config (YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Requests submitted per agent
    #[arg(short, long, default_value_t = 2)]
    pub requests: usize,

    /// Cancel every Nth request instead of completing it (0 = never)
    #[arg(long, default_value_t = 0)]
    pub cancel_every: usize,
}

/// Counts reported at the end of a simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    pub submitted: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl SimulateCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let (config, core) = load_core(&self.config)?;
        let core = Arc::new(core);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let summary = runtime.block_on(simulate(
            core.clone(),
            config.root_admin,
            self.requests,
            self.cancel_every,
        ))?;

        println!("{}", style("Simulation finished").bold());
        println!("  submitted: {}", summary.submitted);
        println!("  completed: {}", style(summary.completed).green());
        println!("  cancelled: {}", style(summary.cancelled).yellow());
        println!("  failed:    {}", style(summary.failed).red());
        println!();
        println!("{}", serde_json::to_string_pretty(&core.snapshot()?)?);
        println!("{}", serde_json::to_string_pretty(&core.audit_stats())?);
        Ok(())
    }
}

fn demo_handler() -> Arc<dyn StrategyHandler> {
    Arc::new(FnHandler::new(
        DEMO_IMPLEMENTATION,
        |ctx: &ExecutionContext, data: &[u8]| {
            tracing::info!(strategy = %ctx.strategy, caller = %ctx.caller, bytes = data.len(), "strategy executed");
            Ok(data.to_vec())
        },
    ))
}

/// Run the handshake against `core`, registering the demo strategy as `admin`
pub async fn simulate(
    core: Arc<ConduitCore>,
    admin: Address,
    requests_per_agent: usize,
    cancel_every: usize,
) -> anyhow::Result<SimulationSummary> {
    if core.router().get_strategy(DEMO_STRATEGY).is_err() {
        core.router()
            .register_strategy(admin, DEMO_STRATEGY, demo_handler())?;
    }

    let executors: Vec<Address> = core
        .agents()
        .agents()?
        .into_iter()
        .filter(|a| core.agents().has_permission(a, Permission::Execute))
        .collect();

    let (tx, mut rx) = mpsc::channel::<(RequestId, Address)>(64);

    let relay_core = core.clone();
    let relay = tokio::spawn(async move {
        let mut summary = SimulationSummary::default();
        while let Some((id, requester)) = rx.recv().await {
            let result = StrategyAction::new(None, id.as_bytes()).encode();
            let outcome = result.and_then(|r| relay_core.bridge().process_response(requester, &id, &r));
            match outcome {
                Ok(_) => summary.completed += 1,
                Err(e) => {
                    tracing::warn!(request = %id, error = %e, "relay could not complete request");
                    summary.failed += 1;
                }
            }
        }
        summary
    });

    let limit = core.bridge().settings()?.max_resource_limit.min(100_000);
    let mut submitted = 0;
    let mut cancelled = 0;
    for agent in &executors {
        for n in 0..requests_per_agent {
            let payload = format!("rebalance #{}", n);
            let id = core.bridge().submit_strategy_request(
                *agent,
                *agent,
                DEMO_STRATEGY,
                payload.as_bytes(),
                limit,
            )?;
            submitted += 1;

            if cancel_every > 0 && submitted % cancel_every == 0 {
                core.bridge().cancel_request(*agent, &id)?;
                cancelled += 1;
                continue;
            }
            tx.send((id, *agent)).await?;
        }
    }
    drop(tx);

    let mut summary = relay.await?;
    summary.submitted = submitted;
    summary.cancelled = cancelled;

    core.bridge().verify_indexes()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::EXAMPLE_CONFIG;
    use conduit::RequestStatus;
    use shared::{ConduitConfig, NullLogger};

    fn example_core() -> Arc<ConduitCore> {
        let config = ConduitConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        Arc::new(ConduitCore::bootstrap(&config, Arc::new(NullLogger)).unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simulate_completes_everything() {
        let core = example_core();

        let summary = simulate(core.clone(), Address::repeat_byte(0x11), 3, 0)
            .await
            .unwrap();

        assert_eq!(summary.submitted, 3);
        assert_eq!(summary.completed, 3);
        assert_eq!(core.bridge().get_active_requests_count().unwrap(), 0);
        assert_eq!(core.router().get_strategy(DEMO_STRATEGY).unwrap().executions, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simulate_with_cancellations() {
        let core = example_core();

        let summary = simulate(core.clone(), Address::repeat_byte(0x11), 4, 2)
            .await
            .unwrap();

        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.completed, 2);
        let cancelled = core
            .bridge()
            .snapshot()
            .unwrap()
            .iter()
            .filter(|r| r.status == RequestStatus::Cancelled)
            .count();
        assert_eq!(cancelled, 2);
    }

    #[tokio::test]
    async fn test_simulate_while_paused_fails() {
        let core = example_core();
        core.access().pause(Address::repeat_byte(0x22)).unwrap();

        assert!(simulate(core, Address::repeat_byte(0x11), 1, 0).await.is_err());
    }
}
