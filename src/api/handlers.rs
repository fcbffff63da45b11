//! Trigger and status handlers

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::pipeline::{RunStateController, Scheduler, TriggerOutcome};
use crate::types::RunState;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ServiceState {
    pub controller: Arc<RunStateController>,
    pub scheduler: Arc<Scheduler>,
}

impl ServiceState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            controller: Arc::new(RunStateController::new()),
            scheduler: Arc::new(scheduler),
        }
    }
}

/// Body of `POST /run`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResponse {
    /// `processing_started` for a new pass, `processing` if one was running
    pub status: String,
}

/// Body of `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: RunState,
}

/// POST /run - Start an analysis pass in the background
pub async fn trigger_run(State(state): State<ServiceState>) -> Json<RunResponse> {
    let status = match state.controller.trigger(state.scheduler.clone()) {
        TriggerOutcome::Started => "processing_started",
        TriggerOutcome::AlreadyRunning => RunState::Processing.as_str(),
    };
    Json(RunResponse {
        status: status.to_string(),
    })
}

/// GET /status - Current run state
pub async fn get_status(State(state): State<ServiceState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.controller.status(),
    })
}
