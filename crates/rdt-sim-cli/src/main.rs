use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use rdt_abstract::{SimConfig, SimConfigOverride};
use rdt_simulator::{SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reliable data transfer simulator (AB, GBN, SR)")]
struct Args {
    /// TOML file with simulation parameters. Flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Protocol to run: AB, GBN or SR.
    #[arg(short, long)]
    protocol: Option<String>,

    /// Number of messages to accept from layer 5.
    #[arg(short = 'n', long)]
    num_messages: Option<u64>,

    #[arg(short, long)]
    loss: Option<f64>,

    #[arg(short, long)]
    corruption: Option<f64>,

    /// Mean time between messages from layer 5.
    #[arg(short = 'd', long)]
    avg_delay: Option<f64>,

    #[arg(short, long)]
    windowsize: Option<usize>,

    #[arg(short, long)]
    timeout: Option<f64>,

    #[arg(short, long)]
    seed: Option<u32>,

    /// Log verbosity from -1 (errors only) to 4.
    #[arg(long, allow_negative_numbers = true)]
    trace: Option<i8>,

    /// Keep running after the last message until the sender is idle, for at
    /// most this much simulated time.
    #[arg(long)]
    drain_limit: Option<f64>,

    /// Write the finished report as JSON.
    #[arg(long)]
    report_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.build_config()?;
    init_logging(config.trace);
    info!("rdt-sim starting with {:?}", config);

    let mut sim = match &args.protocol {
        Some(name) => Simulator::from_name(name, config),
        None => Simulator::from_config(config),
    }
    .context("Invalid simulation parameters")?;
    let report = sim.run().context("Simulation failed")?;

    print_report(&report);
    if let Some(path) = &args.report_out {
        write_report(path, &report)?;
    }

    Ok(())
}

impl Args {
    fn build_config(&self) -> Result<SimConfig> {
        let mut config = SimConfig::default();
        if let Some(path) = &self.config {
            load_override(path)?.apply_to(&mut config);
        }
        self.as_override().apply_to(&mut config);
        Ok(config)
    }

    /// The protocol flag is resolved by name when the simulator is built.
    fn as_override(&self) -> SimConfigOverride {
        SimConfigOverride {
            protocol: None,
            num_messages: self.num_messages,
            loss_probability: self.loss,
            corruption_probability: self.corruption,
            avg_delay: self.avg_delay,
            windowsize: self.windowsize,
            timeout: self.timeout,
            seed: self.seed,
            trace: self.trace,
            drain_limit: self.drain_limit,
        }
    }
}

fn level_for(trace: i8) -> LevelFilter {
    match trace {
        i8::MIN..=-1 => LevelFilter::ERROR,
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

fn init_logging(trace: i8) {
    tracing_subscriber::fmt()
        .with_max_level(level_for(trace))
        .with_target(false)
        .init();
}

fn load_override(path: &Path) -> Result<SimConfigOverride> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let patch: SimConfigOverride =
        toml::from_str(&content).context("Failed to parse config file")?;
    Ok(patch)
}

fn print_report(report: &SimulationReport) {
    println!("Protocol:        {}", report.config.protocol);
    println!("Simulated time:  {:.3}", report.duration);
    println!("Messages sent:   {}", report.num_sent);
    println!("Lines delivered: {}", report.output.len());
    println!("Retransmissions: {}", report.num_retransmitted);
    println!("Packets lost:    {}", report.num_lost);
    println!("Packets corrupt: {}", report.num_corrupt);
    println!("Throughput:      {:.5} packets/unit", report.throughput);
    println!("Goodput:         {:.5} words/unit", report.goodput);
    match report.mean_rtt {
        Some(rtt) => println!("Mean RTT:        {:.3} ({} samples)", rtt, report.rtts.len()),
        None => println!("Mean RTT:        n/a"),
    }
}

fn write_report(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdt_abstract::Protocol;

    #[test]
    fn flags_override_the_config_file() {
        let dir = std::env::temp_dir().join(format!("rdt-sim-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("run.toml");
        fs::write(&path, "protocol = \"SR\"\nloss_probability = 0.5\ntimeout = 30.0\n").unwrap();

        let args = Args::parse_from([
            "rdt-sim",
            "--config",
            path.to_str().unwrap(),
            "--loss",
            "0.1",
            "--trace",
            "-1",
        ]);
        let config = args.build_config().unwrap();
        assert_eq!(config.protocol, Protocol::SelectiveRepeat);
        assert_eq!(config.loss_probability, 0.1);
        assert_eq!(config.timeout, 30.0);
        assert_eq!(config.trace, -1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(toml::from_str::<SimConfigOverride>("loss_rate = 0.1").is_err());
    }

    #[test]
    fn trace_levels_map_to_filters() {
        assert_eq!(level_for(-1), LevelFilter::ERROR);
        assert_eq!(level_for(0), LevelFilter::WARN);
        assert_eq!(level_for(1), LevelFilter::INFO);
        assert_eq!(level_for(4), LevelFilter::DEBUG);
    }
}
