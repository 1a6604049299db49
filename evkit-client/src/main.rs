//! evkit command-line entry point.
//!
//! `evkit --config <path> <method> [json-payload] [--swr]`
//!
//! Prints the resulting envelope as JSON. RPC failures are printed like any
//! other envelope; only configuration and usage errors exit non-zero.

use std::process::ExitCode;

use evkit_client::{init_tracing, Client, ClientConfig, ClientError, TelemetryConfig};
use evkit_core::{Envelope, Failure};
use evkit_storage::{SwrOptions, SwrOutcome};
use serde_json::Value;

const USAGE: &str = "usage: evkit --config <path> <method> [json-payload] [--swr]";

struct Invocation {
    method: String,
    payload: Value,
    swr: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Invocation, String> {
    let mut positional = Vec::new();
    let mut swr = false;
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                args.next();
            }
            "--swr" => swr = true,
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    let method = positional.next().ok_or_else(|| USAGE.to_string())?;
    let payload = match positional.next() {
        Some(raw) => {
            serde_json::from_str(&raw).map_err(|e| format!("invalid JSON payload: {}", e))?
        }
        None => Value::Object(Default::default()),
    };
    if positional.next().is_some() {
        return Err(USAGE.to_string());
    }
    Ok(Invocation {
        method,
        payload,
        swr,
    })
}

fn print_envelope(envelope: &Envelope) {
    match serde_json::to_string(envelope) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to encode envelope: {}", e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(&TelemetryConfig::default()) {
        eprintln!("{}", e);
    }

    let invocation = match parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let client = match ClientConfig::load()
        .map_err(ClientError::from)
        .and_then(|config| Client::from_config(&config))
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    if invocation.swr {
        let options = SwrOptions::new().on_update(|value| {
            print_envelope(&Envelope::ok(value.clone()));
        });
        let report = client
            .swr(&invocation.method, invocation.payload, options)
            .join()
            .await;
        match report.outcome {
            SwrOutcome::Failed(failure) => print_envelope(&Envelope::Err(failure)),
            SwrOutcome::Aborted { reason } => {
                print_envelope(&Envelope::Err(Failure::internal(reason)))
            }
            SwrOutcome::NotStored { error, .. } => {
                tracing::warn!(error = %error, "Fresh value was not cached")
            }
            SwrOutcome::NotModified | SwrOutcome::Refreshed { .. } | SwrOutcome::Empty => {}
        }
    } else {
        let envelope = client.call(&invocation.method, invocation.payload).await;
        print_envelope(&envelope);
    }

    client.diagnostics().flush();
    ExitCode::SUCCESS
}
