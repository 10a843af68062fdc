use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

use engagefx::clock::{Clock, SharedClock, SystemClock};
use engagefx::config::EngineConfig;
use engagefx::engine::signals::{LogSink, SignalHub};
use engagefx::engine::Engine;
use engagefx::logging::{log, obj, v_str, Domain, Level};
use engagefx::metrics::export::ExportFormat;
use engagefx::storage::StateStore;

/// Reads JSON-lines events from stdin, ticks once a second, and prints the
/// session export on EOF or Ctrl-C.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = EngineConfig::from_env();
    let clock: SharedClock = Arc::new(SystemClock);
    let hub = SignalHub::shared();
    hub.subscribe("log", Arc::new(LogSink));

    let mut engine = Engine::new(cfg.clone(), clock.clone(), hub.clone());
    if let Some(path) = &cfg.sqlite_path {
        let mut store = StateStore::new(path)?;
        store.init()?;
        engine = engine.with_store(store);
        let restored = engine.restore_latest()?;
        log(
            Level::Info,
            Domain::Storage,
            "startup_recovery",
            obj(&[
                ("path", v_str(path)),
                ("status", v_str(if restored { "restored" } else { "fresh" })),
            ]),
        );
    }
    log(
        Level::Info,
        Domain::System,
        "started",
        obj(&[
            ("streamer_id", v_str(&cfg.streamer_id)),
            ("attribute_to_actor", serde_json::json!(cfg.attribute_to_actor)),
        ]),
    );

    let engine = Arc::new(Mutex::new(engine));

    let tick_engine = Arc::clone(&engine);
    let tick_clock = clock.clone();
    let ticker = tokio::spawn(async move {
        let mut every = interval(Duration::from_secs(1));
        loop {
            every.tick().await;
            let now = tick_clock.now_ms();
            tick_engine.lock().await.tick(now);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let mut e = engine.lock().await;
                // rejections are logged by the engine
                if e.submit_line(&line).is_ok() {
                    e.pump();
                }
            }
            _ = &mut shutdown => {
                log(Level::Info, Domain::System, "interrupted", obj(&[]));
                break;
            }
        }
    }

    ticker.abort();
    let mut e = engine.lock().await;
    e.pump();
    e.persist(clock.now_ms())?;
    e.log_summary();

    let format = std::env::var("EXPORT_FORMAT")
        .ok()
        .and_then(|v| ExportFormat::parse(&v))
        .unwrap_or(ExportFormat::Json);
    println!("{}", e.export(format)?.into_text()?);
    Ok(())
}
