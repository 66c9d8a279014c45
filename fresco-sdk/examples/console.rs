//! Interactive console for a Fresco controller
//!
//! ```text
//! cargo run -p fresco-sdk --example console -- --address 10.0.0.20 --port 23
//! ```
//!
//! Commands: `select <index>`, `poll [scene] [room]`, `scenes`,
//! `debug <level> [revert secs]`, `reset`, `quit`.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam::channel;
use fresco_protocol::Scene;
use fresco_sdk::logging::{init_logging, parse_mode};
use fresco_sdk::{DeviceConfig, FeedbackKey, FrescoConfig, FrescoDevice, FrescoFactory};
use fresco_transport::{TcpClient, TcpConfig};

/// Fresco Console
///
/// Connects to a controller, prints feedback changes and accepts scene
/// commands on stdin.
#[derive(Parser, Debug)]
#[command(name = "fresco-console")]
#[command(about = "Drive an Acuity Fresco controller from the terminal")]
struct Args {
    /// Device config entry (JSON); overrides address and port
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller address
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    /// Controller port
    #[arg(short, long, default_value = "23")]
    port: u16,

    /// Logging mode (silent, development, debug)
    #[arg(long, default_value = "development")]
    log_mode: String,
}

fn build(args: &Args) -> Result<Arc<FrescoDevice>> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let entry: DeviceConfig = serde_json::from_str(&text).context("parsing device entry")?;
        return Ok(FrescoFactory::new().build_device(&entry)?);
    }

    let config = FrescoConfig::new(vec![
        Scene::new(1, 100, "A", "Full"),
        Scene::new(2, 50, "A", "Dim"),
        Scene::new(0, 0, "A", "Off"),
    ]);
    let transport = Arc::new(TcpClient::new(TcpConfig::new(&args.address, args.port)));
    Ok(FrescoDevice::new("console", "Console", config, transport)?)
}

fn run_command(device: &FrescoDevice, line: &str) -> Result<bool> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => {}
        ["quit"] | ["exit"] => return Ok(false),
        ["select", index] => device.select_scene(index.parse()?)?,
        ["poll"] => device.poll(None, None),
        ["poll", scene] => device.poll(Some(scene.parse()?), None),
        ["poll", scene, room] => device.poll(Some(scene.parse()?), Some(*room)),
        ["scenes"] => {
            for state in device.scenes() {
                let marker = if state.is_active { "*" } else { " " };
                println!(
                    "{marker} [{}] {} (scene {} level {} room {})",
                    state.index, state.scene.name, state.scene.id, state.scene.level, state.scene.room_id
                );
            }
        }
        ["debug", level] => device.set_debug_levels(level.parse()?, None)?,
        ["debug", level, secs] => device
            .set_debug_levels(level.parse()?, Some(Duration::from_secs(secs.parse()?)))?,
        ["reset"] => device.reset_debug_levels(),
        _ => bail!("unknown command: {line}"),
    }
    Ok(true)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(parse_mode(&args.log_mode)?)?;

    let device = build(&args)?;
    for key in device.feedback().keys() {
        device.feedback().watch(key);
    }
    device.initialize()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let (line_tx, line_rx) = channel::unbounded::<String>();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(|l| l.ok()) {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("Connected console for {} (Ctrl+C to quit)", device.name());
    let changes = device.feedback().iter();
    while running.load(Ordering::SeqCst) {
        if let Some(event) = changes.recv_timeout(Duration::from_millis(200)) {
            match event.key {
                FeedbackKey::Online | FeedbackKey::MonitorStatus | FeedbackKey::SelectedScene => {
                    println!("[{}] {}", event.key, event.value)
                }
                _ => println!("  {} = {}", event.key, event.value),
            }
        }
        for line in line_rx.try_iter() {
            match run_command(&device, &line) {
                Ok(true) => {}
                Ok(false) => running.store(false, Ordering::SeqCst),
                Err(e) => eprintln!("error: {e}"),
            }
        }
    }

    println!("Shutting down...");
    device.dispose();
    Ok(())
}
