use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::proxy::{Dispatcher, TargetStats};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub targets: usize,
    pub healthy_targets: usize,
}

#[derive(Serialize)]
pub struct TargetStatus {
    pub index: usize,
    pub url: String,
    pub name: Option<String>,
    pub weight: u32,
    pub healthy: bool,
    pub active_attempts: usize,
}

#[derive(Serialize)]
pub struct StatsSummary {
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub targets: Vec<TargetStats>,
}

pub async fn get_health(State(dispatcher): State<Arc<Dispatcher>>) -> Json<SystemStatus> {
    let targets = dispatcher.pool().targets();
    let healthy_targets = targets.iter().filter(|t| t.is_healthy()).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if healthy_targets > 0 { "operational" } else { "degraded" },
        targets: targets.len(),
        healthy_targets,
    })
}

pub async fn get_targets(State(dispatcher): State<Arc<Dispatcher>>) -> Json<Vec<TargetStatus>> {
    let statuses = dispatcher
        .stats()
        .into_iter()
        .map(|s| TargetStatus {
            index: s.index,
            url: s.url,
            name: s.name,
            weight: s.weight,
            healthy: s.healthy,
            active_attempts: s.active_attempts,
        })
        .collect();

    Json(statuses)
}

pub async fn get_stats(State(dispatcher): State<Arc<Dispatcher>>) -> Json<StatsSummary> {
    let targets = dispatcher.stats();

    Json(StatsSummary {
        total_requests: targets.iter().map(|t| t.requests).sum(),
        total_successes: targets.iter().map(|t| t.successes).sum(),
        total_failures: targets.iter().map(|t| t.failures).sum(),
        targets,
    })
}
