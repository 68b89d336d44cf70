//! The saga record persisted by the saga store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{SagaId, Version};
use serde::{Deserialize, Serialize};

use super::{SAGA_TYPE, SagaData, SagaPayload, SagaStatus, SagaStep};

/// Default number of automatic retries granted to a saga.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Durable state of one booking transaction.
///
/// Records are only mutated by the orchestrator and the compensation
/// service. Every mutating helper bumps `last_updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub id: SagaId,
    pub saga_type: String,

    pub appointment_id: String,
    pub booking_id: Option<String>,
    pub property_id: Option<i64>,
    pub requester_id: Option<i64>,
    pub provider_id: Option<i64>,

    pub current_step: SagaStep,
    pub status: SagaStatus,
    pub completed_steps: BTreeSet<SagaStep>,
    pub failed_steps: BTreeSet<SagaStep>,
    pub saga_data: SagaData,

    /// Last failure description.
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub compensation_required: bool,

    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub compensation_started_at: Option<DateTime<Utc>>,
    pub compensation_completed_at: Option<DateTime<Utc>>,

    /// Store-assigned version; saves are rejected when it is stale.
    #[serde(default)]
    pub version: Version,
}

impl SagaRecord {
    /// Creates a fresh booking saga for an appointment.
    pub fn new_booking_saga(appointment_id: impl Into<String>, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            saga_type: SAGA_TYPE.to_string(),
            appointment_id: appointment_id.into(),
            booking_id: None,
            property_id: None,
            requester_id: None,
            provider_id: None,
            current_step: SagaStep::AppointmentConfirmed,
            status: SagaStatus::Initiated,
            completed_steps: BTreeSet::new(),
            failed_steps: BTreeSet::new(),
            saga_data: SagaData::new(),
            error_message: None,
            retry_count: 0,
            max_retries,
            compensation_required: false,
            started_at: now,
            last_updated_at: now,
            completed_at: None,
            compensation_started_at: None,
            compensation_completed_at: None,
            version: Version::initial(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }

    /// Records a finished step. Adding a step twice is a no-op.
    pub fn mark_step_completed(&mut self, step: SagaStep) {
        self.completed_steps.insert(step);
        self.touch();
    }

    /// Records a step that errored at least once.
    pub fn mark_step_failed(&mut self, step: SagaStep) {
        self.failed_steps.insert(step);
        self.touch();
    }

    pub fn put_data(&mut self, key: impl Into<String>, value: SagaPayload) {
        self.saga_data.insert(key, value);
        self.touch();
    }

    pub fn is_step_completed(&self, step: SagaStep) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Returns true while automatic retries remain.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn increment_retry_count(&mut self) {
        self.retry_count += 1;
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completed steps in reverse execution order.
    pub fn completed_steps_reversed(&self) -> impl Iterator<Item = SagaStep> + '_ {
        self.completed_steps.iter().rev().copied()
    }
}
