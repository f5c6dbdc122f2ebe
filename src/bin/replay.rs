//! Offline replay: drive the fusion engine with a recorded session.
//!
//! The session file is JSONL with one event per line, tagged by type:
//!   {"type":"fix","ts":1000,"lat":37.0,"lon":-122.0,"acc":8.0,"spd":3.1,"hdg":92.0}
//!   {"type":"imu","ts":1020,"ax":0.1,"ay":0.0,"az":9.8,"gx":0.0,"gy":0.0,"gz":0.01}
//!
//! Run with: cargo run --bin replay -- session.jsonl --roads roads.json

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use nav_fusion_rs::map_match::parse_road_records;
use nav_fusion_rs::{EngineConfig, EngineEvent, GpsFix, ImuSample, PositionEngine};

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a recorded sensor session through the fusion engine", long_about = None)]
struct Args {
    /// Session file (JSONL, fix and imu events interleaved by timestamp)
    session: PathBuf,

    /// Road data JSON file (array of road records)
    #[arg(long)]
    roads: Option<PathBuf>,

    /// Engine config JSON file (camelCase options map)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSONL path (default: replay_<utc timestamp>.jsonl)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SessionEvent {
    Fix(GpsFix),
    Imu(ImuSample),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).context("parsing config")?
        }
        None => EngineConfig::default(),
    };

    let mut engine = PositionEngine::new(config);

    if let Some(path) = &args.roads {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading roads {}", path.display()))?;
        let records = parse_road_records(&text).context("parsing road data")?;
        let loaded = engine
            .load_road_data(&records)
            .context("loading road data")?;
        log::info!("loaded {} road segments", loaded);
    }

    let output_path = args.output.unwrap_or_else(|| {
        PathBuf::from(format!("replay_{}.jsonl", Utc::now().format("%Y%m%dT%H%M%SZ")))
    });
    let mut writer = BufWriter::new(
        File::create(&output_path)
            .with_context(|| format!("creating output {}", output_path.display()))?,
    );

    let reader = BufReader::new(
        File::open(&args.session)
            .with_context(|| format!("opening session {}", args.session.display()))?,
    );

    let mut line_no = 0usize;
    let mut skipped = 0usize;
    let mut priority_switches = 0usize;

    for line in reader.lines() {
        line_no += 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: SessionEvent = match serde_json::from_str(&line) {
            Ok(ev) => ev,
            Err(e) => {
                log::warn!("line {}: skipping unparseable event: {}", line_no, e);
                skipped += 1;
                continue;
            }
        };

        let output = match event {
            SessionEvent::Fix(fix) => engine.on_fix(&fix),
            SessionEvent::Imu(sample) => engine.on_inertial(&sample),
        };

        for effect in &output.events {
            if let EngineEvent::PriorityChanged { from, to, t_ms } = effect {
                priority_switches += 1;
                log::info!("priority {} -> {} at {} ms", from, to, t_ms);
            }
        }

        if let Some(record) = output.position {
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;

    let stats = engine.stats();
    log::info!("=== Replay Summary ===");
    log::info!("events read:        {}", line_no);
    log::info!("unparseable lines:  {}", skipped);
    log::info!("fixes accepted:     {}", stats.fixes_accepted);
    log::info!("fixes dropped:      {}", stats.fixes_dropped);
    log::info!("fixes held:         {}", stats.fixes_held);
    log::info!("dr steps:           {}", stats.dr_steps);
    log::info!("snaps applied:      {}", stats.snaps_applied);
    log::info!("snaps rejected:     {}", stats.snaps_rejected);
    log::info!("records emitted:    {}", stats.records_emitted);
    log::info!("priority switches:  {}", priority_switches);
    log::info!("output: {}", output_path.display());

    Ok(())
}
