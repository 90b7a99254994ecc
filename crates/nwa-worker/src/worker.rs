//! Job message worker

use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{Broker, Mailbox, StompError};

/// Identifies the job step a message belongs to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub subscription_id: Value,
    pub job_id: Value,
    pub step_id: Value,
}

/// Message counters of a worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Handled without error
    pub processed: u64,
    /// Unparseable or rejected by the handler
    pub erroneous: u64,
    /// The handler panicked
    pub fatal: u64,
}

impl Display for WorkerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed; {} erroneous; {} fatal",
            self.processed, self.erroneous, self.fatal
        )
    }
}

/// Split a message body into job metadata and payload
pub fn parse_message(body: &str) -> Result<(JobMeta, Value), String> {
    let Ok(Value::Object(mut data)) = serde_json::from_str::<Value>(body) else {
        return Err("invalid data format".to_string());
    };
    let mut take = |key: &str| match data.remove(key) {
        None | Some(Value::Null) => Err(format!("{} is not specified", key)),
        Some(value) => Ok(value),
    };
    let meta = JobMeta {
        subscription_id: take("subscription_id")?,
        job_id: take("job_id")?,
        step_id: take("step_id")?,
    };
    let payload = take("payload")?;
    Ok((meta, payload))
}

/// Stops a running worker from another task
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }
}

enum WorkerSignal {
    Terminate(&'static str),
    Reconnect,
    Report,
}

#[cfg(unix)]
struct Signals {
    term: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
    usr1: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
            hup: signal(SignalKind::hangup())?,
            usr1: signal(SignalKind::user_defined1())?,
        })
    }

    async fn recv(&mut self) -> WorkerSignal {
        tokio::select! {
            _ = self.term.recv() => WorkerSignal::Terminate("SIGTERM"),
            _ = self.int.recv() => WorkerSignal::Terminate("SIGINT"),
            _ = self.hup.recv() => WorkerSignal::Reconnect,
            _ = self.usr1.recv() => WorkerSignal::Report,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Signals)
    }

    async fn recv(&mut self) -> WorkerSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => WorkerSignal::Terminate("Ctrl+C"),
            Err(_) => std::future::pending().await,
        }
    }
}

/// Runs messages from one subscription through a handler.
///
/// While running, `SIGTERM` and `SIGINT` disconnect and stop the worker,
/// `SIGHUP` reconnects and `SIGUSR1` logs the message counters.
pub struct Worker {
    mailbox: Mailbox,
    broker: Broker,
    subid: String,
    inbound_queue: String,
    stats: WorkerStats,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Worker {
    pub fn new(
        broker_host: impl Into<String>,
        broker_port: u16,
        subid: impl Into<String>,
        inbound_queue: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Self {
            mailbox: Mailbox::new(),
            broker: Broker::new(broker_host, broker_port),
            subid: subid.into(),
            inbound_queue: inbound_queue.into(),
            stats: WorkerStats::default(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: self.shutdown_tx.clone(),
        }
    }

    async fn connect(&mut self) -> Result<(), StompError> {
        self.broker.connect(&self.mailbox).await?;
        self.broker.subscribe(&self.subid, &self.inbound_queue).await
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.broker.disconnect().await {
            warn!(broker = %self.broker, error = %e, "Disconnect failed");
        }
    }

    /// Connect and process messages until shut down.
    ///
    /// Returns the final counters, or the error when the broker cannot be
    /// reached.
    pub async fn run<H, E>(&mut self, mut handler: H) -> Result<WorkerStats, StompError>
    where
        H: FnMut(JobMeta, Value) -> Result<(), E>,
        E: Display,
    {
        if let Err(e) = self.connect().await {
            error!("Cannot connect to broker {}\n{}", self.broker, e);
            return Err(e);
        }
        let mut signals = Signals::install()?;

        info!(
            "Worker is now connected to {} and listening on '{}'",
            self.broker, self.inbound_queue
        );

        loop {
            tokio::select! {
                message = self.mailbox.receive() => {
                    if let Some(message) = message {
                        self.process(&mut handler, &message.body);
                    }
                }
                signal = signals.recv() => match signal {
                    WorkerSignal::Terminate(name) => {
                        info!("Interrupted with signal {}. Shutting down..", name);
                        self.disconnect().await;
                        return Ok(self.stats);
                    }
                    WorkerSignal::Reconnect => {
                        info!("Reconnecting..");
                        self.disconnect().await;
                        self.connect().await?;
                    }
                    WorkerSignal::Report => info!("Worker Report: {}", self.stats),
                },
                _ = self.shutdown_rx.recv() => {
                    info!("Shutting down..");
                    self.disconnect().await;
                    return Ok(self.stats);
                }
            }
        }
    }

    /// Run one message body through `handler` and count the outcome
    pub fn process<H, E>(&mut self, handler: &mut H, body: &str)
    where
        H: FnMut(JobMeta, Value) -> Result<(), E>,
        E: Display,
    {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            parse_message(body)
                .and_then(|(meta, payload)| handler(meta, payload).map_err(|e| e.to_string()))
        }));

        match outcome {
            Ok(Ok(())) => self.stats.processed += 1,
            Ok(Err(err)) => {
                error!("Error while processing message: {}\nMessage: {}", err, body);
                self.stats.erroneous += 1;
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Panic: {} (message: {})", reason, body);
                self.stats.fatal += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message() {
        let (meta, payload) = parse_message(
            r#"{"subscription_id": "abc", "job_id": 1, "step_id": 2, "payload": {"vlan": 10}}"#,
        )
        .unwrap();
        assert_eq!(meta.subscription_id, json!("abc"));
        assert_eq!(meta.job_id, json!(1));
        assert_eq!(meta.step_id, json!(2));
        assert_eq!(payload, json!({"vlan": 10}));
    }

    #[test]
    fn test_parse_message_errors() {
        assert_eq!(parse_message("not json").unwrap_err(), "invalid data format");
        assert_eq!(parse_message("[1, 2]").unwrap_err(), "invalid data format");
        assert_eq!(
            parse_message(r#"{"job_id": 1, "step_id": 2, "payload": {}}"#).unwrap_err(),
            "subscription_id is not specified"
        );
        assert_eq!(
            parse_message(r#"{"subscription_id": "a", "job_id": null, "step_id": 2, "payload": {}}"#)
                .unwrap_err(),
            "job_id is not specified"
        );
        assert_eq!(
            parse_message(r#"{"subscription_id": "a", "job_id": 1, "step_id": 2}"#).unwrap_err(),
            "payload is not specified"
        );
    }

    #[test]
    fn test_process_counts_outcomes() {
        let mut worker = Worker::new("localhost", 61613, "sub-1", "/queue/jobs");
        let mut handler = |_meta: JobMeta, payload: Value| -> Result<(), String> {
            match payload.as_str() {
                Some("fail") => Err("handler refused".to_string()),
                Some("explode") => panic!("handler blew up"),
                _ => Ok(()),
            }
        };
        let body = |payload: &str| {
            json!({"subscription_id": "s", "job_id": 1, "step_id": 1, "payload": payload}).to_string()
        };

        worker.process(&mut handler, &body("ok"));
        worker.process(&mut handler, &body("fail"));
        worker.process(&mut handler, "garbage");
        worker.process(&mut handler, &body("explode"));

        assert_eq!(
            worker.stats(),
            WorkerStats {
                processed: 1,
                erroneous: 2,
                fatal: 1
            }
        );
        assert_eq!(worker.stats().to_string(), "1 processed; 2 erroneous; 1 fatal");
    }
}
