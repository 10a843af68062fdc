//! Random local event producer. Writes JSON lines to stdout for piping into
//! `engagefx` or saving for `replay`.
//!
//! EVENTS (default 500), SEED (default 7), START_MS (default 0), STEP_MS (default 250).

use std::io::{self, BufWriter, Write};

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};

const AUDIENCE: [&str; 8] = ["ana", "bo", "cid", "dee", "eli", "fay", "gus", "hal"];
const GIFTS: [(&str, u64); 4] = [("Rose", 1), ("Heart", 5), ("Lion", 50), ("Universe", 100)];
const EFFECTS: [&str; 3] = ["neon", "hologram", "glitch"];
const VOICES: [&str; 3] = ["alien", "monster", "robot"];

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn next_event(rng: &mut StdRng, ts: u64, viewers: &mut i64) -> Value {
    let who = AUDIENCE[rng.gen_range(0..AUDIENCE.len())];
    let roll: f64 = rng.gen();
    if roll < 0.10 {
        *viewers = (*viewers + rng.gen_range(-5..=12)).max(0);
        json!({"type": "viewerCount", "count": *viewers, "timestamp": ts})
    } else if roll < 0.40 {
        json!({"type": "like", "count": rng.gen_range(1..=5), "timestamp": ts})
    } else if roll < 0.65 {
        json!({"type": "comment", "author": who, "text": "hello", "timestamp": ts})
    } else if roll < 0.72 {
        let (name, value) = GIFTS[rng.gen_range(0..GIFTS.len())];
        json!({"type": "gift", "sender": who, "name": name, "value": value, "timestamp": ts})
    } else if roll < 0.85 {
        json!({
            "type": "motion",
            "intensity": rng.gen_range(0.0..1.0),
            "hasMotion": rng.gen_bool(0.8),
            "timestamp": ts
        })
    } else if roll < 0.89 {
        json!({"type": "effectUsed", "effectName": EFFECTS[rng.gen_range(0..EFFECTS.len())], "timestamp": ts})
    } else if roll < 0.92 {
        json!({"type": "voiceUsed", "voiceName": VOICES[rng.gen_range(0..VOICES.len())], "timestamp": ts})
    } else if roll < 0.95 {
        json!({"type": "share", "user": who, "timestamp": ts})
    } else if roll < 0.98 {
        json!({"type": "follow", "user": who, "timestamp": ts})
    } else {
        json!({"type": "join", "user": who, "timestamp": ts})
    }
}

fn main() -> Result<()> {
    let events = env_u64("EVENTS", 500);
    let mut rng = StdRng::seed_from_u64(env_u64("SEED", 7));
    let start = env_u64("START_MS", 0);
    let step = env_u64("STEP_MS", 250);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut viewers: i64 = 0;
    for i in 0..events {
        let ev = next_event(&mut rng, start + i * step, &mut viewers);
        writeln!(out, "{}", ev)?;
    }
    out.flush()?;
    Ok(())
}
