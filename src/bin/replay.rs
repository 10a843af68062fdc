//! Feed a JSON-lines event file through the engine on a manual clock.
//!
//! Usage: replay [events.jsonl]   (reads stdin when no path is given)
//!
//! Time follows the events' own `timestamp` fields; the engine is ticked at
//! every whole second in between. Prints the leaderboard and the CSV export.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{Context, Result};
use serde_json::Value;

use engagefx::clock::{Clock, ManualClock};
use engagefx::config::EngineConfig;
use engagefx::engine::signals::RecordingSink;
use engagefx::engine::Engine;
use engagefx::logging::{log, obj, v_str, Domain, Level};
use engagefx::metrics::export::ExportFormat;

const TICK_MS: u64 = 1_000;

fn read_lines(path: Option<String>) -> Result<Vec<String>> {
    let reader: Box<dyn BufRead> = match &path {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("opening {}", p))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn timestamp_of(line: &str) -> Option<u64> {
    serde_json::from_str::<Value>(line)
        .ok()?
        .get("timestamp")?
        .as_u64()
}

fn main() -> Result<()> {
    let lines = read_lines(std::env::args().nth(1))?;
    let start = lines.iter().find_map(|l| timestamp_of(l)).unwrap_or(0);

    let clock = ManualClock::shared(start);
    let sink = RecordingSink::shared();
    let mut engine = Engine::new(EngineConfig::from_env(), clock.clone(), sink.clone());

    let mut next_tick = start + TICK_MS;
    let mut rejected = 0usize;
    for line in &lines {
        if let Some(ts) = timestamp_of(line) {
            while next_tick <= ts {
                clock.set(next_tick);
                engine.tick(next_tick);
                next_tick += TICK_MS;
            }
            if ts > clock.now_ms() {
                clock.set(ts);
            }
        }
        match engine.submit_line(line) {
            Ok(_) => {
                engine.pump();
            }
            Err(_) => rejected += 1,
        }
    }
    // one final tick so the last events land in the sample history
    clock.set(next_tick);
    engine.tick(next_tick);

    engine.log_summary();
    log(
        Level::Info,
        Domain::System,
        "replay_done",
        obj(&[
            ("events", serde_json::json!(lines.len())),
            ("rejected", serde_json::json!(rejected)),
            ("signals", serde_json::json!(sink.signals().len())),
            ("level_ups", serde_json::json!(sink.count("levelUp"))),
            ("msg", v_str("replay complete")),
        ]),
    );

    println!("{}", serde_json::to_string_pretty(engine.leaderboard())?);
    println!("{}", engine.export(ExportFormat::Csv)?.into_text()?);
    Ok(())
}
