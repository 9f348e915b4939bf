//! Inference entry point. Invoked as a subprocess with a single argument,
//! the path to a JSON request file. The one and only stdout line is the
//! JSON result; all diagnostics go to stderr so the parent process can
//! parse stdout unconditionally.
//!
//! Exit codes: 0 for a scored response or a "no valid resumes" message,
//! 1 for any error (with a JSON error payload on stdout).

use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::json;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matcher::config::Config;
use matcher::driver::{self, Outcome};

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("{}", json!({ "error": format!("configuration error: {e}") }));
            return ExitCode::FAILURE;
        }
    };

    // stdout is the wire; logging must stay on stderr
    tracing_subscriber::registry()
        .with(config.log_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let request_path: PathBuf = match std::env::args_os().nth(1) {
        Some(arg) => arg.into(),
        None => {
            println!("{}", json!({ "error": "No input file path provided." }));
            return ExitCode::FAILURE;
        }
    };

    match driver::run(&request_path, &config.model_path) {
        Ok(Outcome::Scored(response)) => match serde_json::to_string(&response) {
            Ok(line) => {
                println!("{line}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("failed to encode response: {e}");
                println!(
                    "{}",
                    json!({ "error": format!("failed to encode response: {e}"), "jobId": response.job_id })
                );
                ExitCode::FAILURE
            }
        },
        Ok(Outcome::NoValidResumes { job_id }) => {
            println!(
                "{}",
                json!({ "message": "No valid resumes processed.", "jobId": job_id })
            );
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!("scoring failed: {}", failure.error);
            let payload = match failure.job_id {
                Some(job_id) => json!({ "error": failure.error.to_string(), "jobId": job_id }),
                None => json!({ "error": failure.error.to_string() }),
            };
            println!("{payload}");
            ExitCode::FAILURE
        }
    }
}
