use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use deadlockd::monitor::{self, DeadlockMonitor};
use deadlockd::Config;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(clap::Parser, Debug)]
#[clap(version, about = "Heuristic process deadlock detector")]
struct Args {
    /// Path to the TOML config file
    #[clap(long, env = "DEADLOCKD_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[clap(long)]
    pretty: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run one poll and print the result
    Status,
    /// Poll periodically until interrupted
    Watch {
        /// Seconds between polls (overrides the config file)
        #[clap(long)]
        interval: Option<u64>,
        /// Stop after this many polls
        #[clap(long)]
        count: Option<usize>,
    },
    /// List running processes
    Processes,
    /// Show details for one process
    Process { pid: u32 },
    /// Kill a process
    Kill { pid: u32 },
    /// Kill a process and start its command line again
    Restart { pid: u32 },
    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

async fn warm_up() {
    // CPU usage needs two refreshes at least this far apart
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::resolve(args.config.as_deref())?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    let pretty = args.pretty || config.output.pretty;

    if let Command::InitConfig { path } = &args.command {
        Config::default().save(path)?;
        println!("wrote default config to {}", path.display());
        return Ok(());
    }

    let monitor = Arc::new(DeadlockMonitor::with_sysinfo(&config));

    match args.command {
        Command::Status => {
            warm_up().await;
            let worker = Arc::clone(&monitor);
            let result = tokio::task::spawn_blocking(move || worker.poll())
                .await
                .context("poll task failed")?;
            print_json(&result, pretty)?;
        }
        Command::Watch { interval, count } => {
            let period = Duration::from_secs(interval.unwrap_or(config.runtime.poll_interval_secs));
            info!("deadlockd watching every {}s", period.as_secs());
            warm_up().await;
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    log::error!("failed to listen for ctrl-c: {err}");
                    std::future::pending::<()>().await;
                }
            };
            monitor::watch(
                monitor,
                period,
                count,
                |result| {
                    if let Err(err) = print_json(result, pretty) {
                        log::error!("failed to print poll: {err}");
                    }
                },
                shutdown,
            )
            .await;
        }
        Command::Processes => {
            warm_up().await;
            println!(
                "{:<8} {:<10} {:<7} {:<7} NAME",
                "PID", "STATUS", "CPU%", "MEM%"
            );
            for p in monitor.processes() {
                println!(
                    "{:<8} {:<10} {:<7.1} {:<7.1} {}",
                    p.pid, p.status, p.cpu_percent, p.memory_percent, p.name
                );
            }
        }
        Command::Process { pid } => {
            warm_up().await;
            match monitor.process_info(pid) {
                Ok(info) => print_json(&info, pretty)?,
                Err(err) => bail!(err),
            }
        }
        Command::Kill { pid } => {
            let outcome = monitor.kill(pid);
            print_json(&outcome, pretty)?;
            if !outcome.success {
                bail!(outcome.message);
            }
        }
        Command::Restart { pid } => {
            let outcome = monitor.restart(pid);
            print_json(&outcome, pretty)?;
            if !outcome.success {
                bail!(outcome.message);
            }
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
