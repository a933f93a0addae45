mod backend;
mod config;
mod dates;
mod draft;
mod error;
mod export;
mod ipc;
mod model;
mod notice;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(default_filter: &str) {
    // stdout carries the protocol; logs go to stderr only.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn emit(out: &Mutex<io::Stdout>, value: &serde_json::Value) {
    let line = serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    let mut stdout = out.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = writeln!(stdout, "{}", line);
    let _ = stdout.flush();
}

fn main() -> anyhow::Result<()> {
    let config = config::Config::parse();
    init_tracing(&config.log_level);
    config.validate().context("invalid configuration")?;

    let backend = backend::HttpBackend::new(&config)?;
    info!(
        backend_url = backend.base_url(),
        timeout_ms = config.timeout_ms,
        submit_grace_ms = config.submit_grace_ms,
        "rollcalld ready"
    );
    let state = ipc::AppState::new(config, Arc::new(backend));

    let stdout = Arc::new(Mutex::new(io::stdout()));
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                emit(&stdout, &ipc::err("", "bad_json", e.to_string(), None));
                continue;
            }
        };

        match ipc::handle_request(&state, req) {
            ipc::Reply::Ready(resp) => emit(&stdout, &resp),
            ipc::Reply::Deferred(job) => {
                let out = Arc::clone(&stdout);
                workers.push(thread::spawn(move || emit(&out, &job())));
            }
        }
        workers.retain(|w| !w.is_finished());
    }

    // Let in-flight saves settle so their replies are not lost.
    for w in workers {
        let _ = w.join();
    }
    info!("rollcalld exiting");
    Ok(())
}
