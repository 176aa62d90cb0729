//! queuep – exercise a configured queue with simulated telemetry.
//
//  $ queuep check-config --config queuep.toml
//  $ queuep simulate --config queuep.toml --queue telemetry --devices 20
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::json;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};

use queuep::config::QueueDefinition;
use queuep::{Config, Consumer, PublishOutcome, QueueError, QueueEvent, QueueOptions, Registry};

#[derive(Debug, Parser)]
#[command(name = "queuep", version, about = "QueueP coalescing queue tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish random device readings into one queue and report stats.
    Simulate {
        /// Path to config TOML (env QUEUEP_CONFIG is used when omitted)
        #[arg(short, long)]
        config: Option<String>,
        /// Queue to drive; must be declared in the config unless it is `default`
        #[arg(short, long, default_value = "default")]
        queue: String,
        #[arg(long, default_value_t = 10)]
        devices: usize,
        #[arg(long, default_value_t = 2)]
        publish_every_ms: u64,
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,
        /// Probability in [0, 1] that a consumer invocation fails
        #[arg(long, default_value_t = 0.0)]
        failure_rate: f64,
        #[arg(long, default_value_t = 1)]
        stats_every_secs: u64,
    },
    /// Validate a config file, building every declared dirty checker.
    CheckConfig {
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::CheckConfig { config } => {
            let cfg = Config::load(config.as_deref()).context("invalid configuration")?;
            queuep::logging::init_logging_with(&cfg.logging.level);
            println!(
                "defaults: interval={}ms capacity={} overflow={}",
                cfg.defaults.interval_ms,
                cfg.defaults
                    .capacity
                    .map_or_else(|| "unbounded".to_string(), |c| c.to_string()),
                cfg.defaults.overflow_policy
            );
            for queue in &cfg.queues {
                println!("queue {:<20} checker={:?}", queue.id, queue.dirty_checker);
            }
        }
        Command::Simulate {
            config,
            queue,
            devices,
            publish_every_ms,
            duration_secs,
            failure_rate,
            stats_every_secs,
        } => {
            let cfg = Config::load(config.as_deref()).context("invalid configuration")?;
            queuep::logging::init_logging_with(&cfg.logging.level);

            if devices == 0 || publish_every_ms == 0 || stats_every_secs == 0 {
                bail!("--devices, --publish-every-ms and --stats-every-secs must be > 0");
            }
            if !(0.0..=1.0).contains(&failure_rate) {
                bail!("--failure-rate must be within [0, 1]");
            }

            let options = queue_options(&cfg, &queue)?;
            simulate(
                &queue,
                options,
                Simulation {
                    devices,
                    publish_every: Duration::from_millis(publish_every_ms),
                    duration: Duration::from_secs(duration_secs),
                    failure_rate,
                    stats_every: Duration::from_secs(stats_every_secs),
                },
            )
            .await?;
        }
    }
    Ok(())
}

struct Simulation {
    devices: usize,
    publish_every: Duration,
    duration: Duration,
    failure_rate: f64,
    stats_every: Duration,
}

fn queue_options(cfg: &Config, id: &str) -> anyhow::Result<QueueOptions> {
    let options = match cfg.queue(id) {
        Some(def) => def.options(&cfg.defaults)?,
        None if id == "default" => QueueDefinition {
            id: id.to_string(),
            interval_ms: None,
            capacity: None,
            overflow_policy: None,
            dirty_checker: Default::default(),
        }
        .options(&cfg.defaults)?,
        None => bail!("queue `{id}` is not declared in the configuration"),
    };
    Ok(options)
}

async fn simulate(id: &str, options: QueueOptions, sim: Simulation) -> anyhow::Result<()> {
    let failure_rate = sim.failure_rate;
    let consumer = Consumer::from_async(move |key, data| async move {
        let fail = rand::thread_rng().gen_bool(failure_rate);
        if fail {
            anyhow::bail!("simulated downstream failure for {key}");
        }
        info!(key = %key, data = %data, "delivered");
        Ok(())
    });

    let registry = Registry::new();
    let handle = registry.init_queue(id, options.consumer(consumer))?;
    handle.on(QueueEvent::Error, |ctx| {
        if let Some(err) = ctx.error {
            warn!(queue = ctx.queue_id, error = %err, "consumer failed");
        }
    })?;
    handle.on(QueueEvent::Full, |ctx| {
        warn!(queue = ctx.queue_id, key = ?ctx.key, "queue full");
    })?;

    let mut publish_tick = interval(sim.publish_every);
    publish_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats_tick = interval(sim.stats_every);
    stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = sleep(sim.duration);
    tokio::pin!(deadline);

    let mut published = 0u64;
    let mut skipped = 0u64;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = stats_tick.tick() => {
                handle.print_stats()?;
            }
            _ = publish_tick.tick() => {
                let (key, value) = {
                    let mut rng = rand::thread_rng();
                    let device = rng.gen_range(0..sim.devices);
                    // A narrow value range makes duplicates common.
                    (format!("device-{device}"), rng.gen_range(0..4u8))
                };
                match handle.publish(&key, json!({ "value": value })).await {
                    Ok(PublishOutcome::Skipped) => skipped += 1,
                    Ok(_) => {}
                    Err(QueueError::QueueFull(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                published += 1;
            }
        }
    }

    let stats = handle.get_stats()?;
    println!("published: {published}\nskipped: {skipped}\n{stats}");
    registry.remove_queue(id)?;
    Ok(())
}
