mod calc;
mod config;
mod db;
mod grade;
mod ipc;

use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, prelude::*};

fn init_logging(cfg: &config::Config) {
    // stdout carries the protocol; logs go to stderr.
    let fmt = fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false);
    tracing_subscriber::registry()
        .with(fmt)
        .with(cfg.log_level)
        .init();
}

// No id to reply to.
fn write_bad_json(out: &mut impl Write, message: &str) {
    let body = serde_json::json!({
        "ok": false,
        "error": { "code": "bad_json", "message": message }
    });
    let _ = writeln!(out, "{}", body);
    let _ = out.flush();
}

fn main() {
    let cfg = config::Config::from_env();
    init_logging(&cfg);

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(workspace = %path.display(), error = %e, "startup workspace open failed");
        }
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "request line is not utf-8");
                write_bad_json(&mut stdout, &format!("request line is not utf-8: {}", e));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request line");
                write_bad_json(&mut stdout, &e.to_string());
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
