//! Child-process entry point (spec §4.G steps 1 & 4): the loop a host
//! binary's `main()` runs inside a spawned worker process. Reads
//! controller→worker `Envelope`s from stdin, drives the same
//! [`LocalWorker`] execution contract, and writes worker→controller
//! `Envelope`s to stdout.

use std::sync::Arc;
use std::time::Duration;

use railyard_core::{Clock, Compiler, Logger, Parameters, RailyardError, TestFile};
use railyard_transport::Envelope;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::local::LocalWorker;
use crate::outcome::Outcome;

pub async fn run_worker_process(
    compiler: Arc<dyn Compiler>,
    clock: Arc<dyn Clock>,
    logger: Box<dyn Logger>,
    test_timeout: Duration,
) -> std::io::Result<()> {
    let worker = LocalWorker::spawn(compiler, clock, logger, test_timeout);

    let mut stdout = tokio::io::stdout();
    write_envelope(&mut stdout, &ready_envelope(worker.worker_id())).await?;

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(envelope) = serde_json::from_str::<Envelope>(&line) else {
            continue;
        };
        if envelope.message_type != "worker.execute" {
            continue;
        }
        // Correlate by the caller's own id carried in the payload, not
        // `envelope.request_id` — `Transport::send` stamps every outbound
        // envelope with a fresh id of its own, so the id `RemoteWorker`
        // keyed its pending map with only survives the hop inside the
        // payload (the same convention `railyard-browser`'s broker uses
        // for its `browser.response` round trip).
        let request_id = envelope
            .payload
            .get("requestId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let file: TestFile = match serde_json::from_value(envelope.payload["file"].clone()) {
            Ok(file) => file,
            Err(err) => {
                let message = format!("malformed execute payload: {err}");
                write_envelope(
                    &mut stdout,
                    &outcome_envelope(
                        &request_id,
                        Outcome::Failure(RailyardError::DependencyError(message)),
                    ),
                )
                .await?;
                continue;
            }
        };
        let parameters: Parameters =
            serde_json::from_value(envelope.payload["parameters"].clone()).unwrap_or_default();
        let env_parameters: Parameters =
            serde_json::from_value(envelope.payload["envParameters"].clone()).unwrap_or_default();

        let outcome = worker.execute(file, parameters, env_parameters).await;
        write_envelope(&mut stdout, &outcome_envelope(&request_id, outcome)).await?;
    }
    Ok(())
}

async fn write_envelope(stdout: &mut tokio::io::Stdout, envelope: &Envelope) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(envelope).expect("envelope is always serializable");
    line.push(b'\n');
    stdout.write_all(&line).await
}

fn ready_envelope(worker_id: &str) -> Envelope {
    Envelope::new("worker.ready", serde_json::json!({ "workerId": worker_id }))
        .with_source(worker_id.to_string())
}

fn outcome_envelope(request_id: &str, outcome: Outcome) -> Envelope {
    let payload = match outcome {
        Outcome::Success(value) => serde_json::json!({ "value": value }),
        Outcome::Failure(err) => serde_json::json!({
            "error": { "kind": err.kind(), "message": err.to_string() }
        }),
    };
    Envelope::new("worker.outcome", payload).with_request_id(request_id.to_string())
}
