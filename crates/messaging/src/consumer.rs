//! Appointment event consumption.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{AppointmentEvent, AppointmentEventType};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::{BrokerMessage, MessagingError, Result};

/// Reacts to appointment events the service understands.
#[async_trait]
pub trait AppointmentEventHandler: Send + Sync {
    async fn handle(&self, event: &AppointmentEvent) -> Result<()>;
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Handled(AppointmentEventType),
    /// Decoded, but of a type this service does not react to.
    Ignored,
    Failed(String),
}

impl ConsumeOutcome {
    fn label(&self) -> &'static str {
        match self {
            ConsumeOutcome::Handled(_) => "handled",
            ConsumeOutcome::Ignored => "ignored",
            ConsumeOutcome::Failed(_) => "failed",
        }
    }
}

/// Decodes appointment messages and dispatches each one to the handler.
///
/// A malformed message or a handler error is logged and reported as
/// [`ConsumeOutcome::Failed`]; it never stops the loop. There is no
/// redelivery.
pub struct AppointmentConsumer {
    handler: Arc<dyn AppointmentEventHandler>,
}

impl AppointmentConsumer {
    pub fn new(handler: Arc<dyn AppointmentEventHandler>) -> Self {
        Self { handler }
    }

    /// Processes one message body.
    #[tracing::instrument(skip(self, body))]
    pub async fn consume_message(&self, body: &str) -> ConsumeOutcome {
        let outcome = match decode(body) {
            Err(err) => {
                tracing::error!(error = %err, "dropping undecodable appointment message");
                ConsumeOutcome::Failed(err.to_string())
            }
            Ok(event) if event.event_type == AppointmentEventType::Unknown => {
                tracing::debug!(
                    appointment_id = %event.appointment_id,
                    "appointment event type not handled by booking service"
                );
                ConsumeOutcome::Ignored
            }
            Ok(event) => {
                tracing::info!(
                    event_type = %event.event_type,
                    appointment_id = %event.appointment_id,
                    "received appointment event"
                );
                match self.handler.handle(&event).await {
                    Ok(()) => ConsumeOutcome::Handled(event.event_type),
                    Err(err) => {
                        tracing::error!(
                            appointment_id = %event.appointment_id,
                            error = %err,
                            "failed to process appointment event"
                        );
                        ConsumeOutcome::Failed(err.to_string())
                    }
                }
            }
        };

        metrics::counter!("appointment_events_consumed_total", "outcome" => outcome.label())
            .increment(1);
        outcome
    }

    /// Consumes messages until the queue is closed.
    pub async fn run(self, mut receiver: broadcast::Receiver<BrokerMessage>) {
        tracing::info!("appointment consumer started");
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    self.consume_message(&message.body).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "appointment consumer lagged, messages lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("appointment consumer stopped");
    }

    /// Runs the consumer on its own task.
    pub fn spawn(self, receiver: broadcast::Receiver<BrokerMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}

fn decode(body: &str) -> Result<AppointmentEvent> {
    serde_json::from_str(body).map_err(|e| MessagingError::Decode(e.to_string()))
}
