//! Staff pick/process transitions.
//!
//! FG and SFG lines go `PENDING -> COMPLETED`. WIP lines go
//! `PENDING -> WIP_PROCESSING -> COMPLETED`. Picking less than a line's
//! quantity splits it: the original keeps its status with the quantity
//! reduced, and a clone carrying the picked quantity takes the next status.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::order::{Category, LineRevision, LineStatus, OrderLine};
use crate::store::OrderStore;

/// Name stamped on lines a staff member picks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(String);

impl Actor {
    pub fn new(name: impl Into<String>) -> Result<Self, WorkflowError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(WorkflowError::MissingActor);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How picks guard against a stale client view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyGuard {
    /// Commit only if the line still has the observed quantity and status.
    #[default]
    Optimistic,
    /// Write absolute values computed from the observed revision. Two staff
    /// acting on the same stale view can both commit.
    Unguarded,
}

/// A staff action on one line, as decided from the client's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRequest {
    pub line_id: String,
    pub quantity: u32,
    pub observed: LineRevision,
}

impl PickRequest {
    pub fn for_line(line: &OrderLine, quantity: u32) -> Self {
        Self {
            line_id: line.id.clone(),
            quantity,
            observed: line.revision(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The whole line moved to its next status.
    Transitioned { line: OrderLine },
    /// Part of the line was picked into a new line.
    Split {
        remaining: OrderLine,
        picked: OrderLine,
    },
}

impl PickOutcome {
    /// The line now carrying the picked quantity.
    pub fn picked(&self) -> &OrderLine {
        match self {
            PickOutcome::Transitioned { line } => line,
            PickOutcome::Split { picked, .. } => picked,
        }
    }
}

/// The status a pick moves a line to.
pub fn next_status(
    line_id: &str,
    category: Category,
    status: LineStatus,
) -> Result<LineStatus, WorkflowError> {
    match (category, status) {
        (_, LineStatus::Completed) => Err(WorkflowError::AlreadyCompleted {
            line_id: line_id.to_string(),
        }),
        (Category::Wip, LineStatus::Pending) => Ok(LineStatus::WipProcessing),
        (Category::Wip, LineStatus::WipProcessing) => Ok(LineStatus::Completed),
        (_, LineStatus::WipProcessing) => Err(WorkflowError::InvalidState {
            line_id: line_id.to_string(),
            status,
        }),
        (_, LineStatus::Pending) => Ok(LineStatus::Completed),
    }
}

/// Checks a request against what the client observed. Reads nothing.
pub fn validate(request: &PickRequest) -> Result<(), WorkflowError> {
    let observed = request.observed;
    if observed.status == LineStatus::Completed {
        return Err(WorkflowError::AlreadyCompleted {
            line_id: request.line_id.clone(),
        });
    }
    if request.quantity == 0 || request.quantity > observed.quantity {
        return Err(WorkflowError::InvalidQuantity {
            requested: request.quantity,
            available: observed.quantity,
        });
    }
    Ok(())
}

pub struct Workflow {
    store: Arc<OrderStore>,
    guard: ConcurrencyGuard,
}

impl Workflow {
    pub fn new(store: Arc<OrderStore>, guard: ConcurrencyGuard) -> Self {
        if guard == ConcurrencyGuard::Unguarded {
            log::warn!("Workflow running unguarded; concurrent picks can over-pick");
        }
        Self { store, guard }
    }

    pub fn guard(&self) -> ConcurrencyGuard {
        self.guard
    }

    /// Applies a pick. Nothing is written if validation fails.
    pub fn pick(&self, request: &PickRequest, actor: &Actor) -> Result<PickOutcome, WorkflowError> {
        validate(request)?;

        // Category and the copied fields never change after creation.
        let stored = self.store.get(&request.line_id)?;
        let next = next_status(&request.line_id, stored.category, request.observed.status)?;
        let now = Utc::now();

        let outcome = if request.quantity == request.observed.quantity {
            let line = match self.guard {
                ConcurrencyGuard::Optimistic => self.store.complete_if_unchanged(
                    &request.line_id,
                    request.observed,
                    next,
                    actor.name(),
                    now,
                )?,
                ConcurrencyGuard::Unguarded => {
                    self.store
                        .overwrite_status(&request.line_id, next, actor.name(), now)?
                }
            };
            PickOutcome::Transitioned { line }
        } else {
            let clone = OrderLine {
                id: Uuid::new_v4().to_string(),
                quantity: request.quantity,
                status: next,
                picked_by: Some(actor.name().to_string()),
                picked_at: Some(now),
                ..stored
            };
            let (remaining, picked) = match self.guard {
                ConcurrencyGuard::Optimistic => {
                    self.store
                        .split_if_unchanged(&request.line_id, request.observed, &clone)?
                }
                ConcurrencyGuard::Unguarded => self.store.overwrite_split(
                    &request.line_id,
                    request.observed.quantity - request.quantity,
                    &clone,
                )?,
            };
            PickOutcome::Split { remaining, picked }
        };

        log::info!(
            "{} picked {} of line {} -> {}",
            actor,
            request.quantity,
            request.line_id,
            next
        );
        Ok(outcome)
    }
}
