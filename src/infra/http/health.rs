use std::sync::{Arc, Mutex, PoisonError};

use axum::{Json, extract::State};
use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};
use time::OffsetDateTime;
use tracing::warn;

use super::HttpState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub memory: MemoryUsage,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub system_used_bytes: u64,
    pub system_total_bytes: u64,
}

/// Process and host memory, sampled on demand off the async workers.
#[derive(Clone)]
pub struct MemorySampler {
    system: Arc<Mutex<System>>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    /// Refreshes run on the blocking pool; a failed refresh reports zeroes.
    pub async fn sample(&self) -> MemoryUsage {
        let system = Arc::clone(&self.system);
        match tokio::task::spawn_blocking(move || read_memory(&system)).await {
            Ok(usage) => usage,
            Err(err) => {
                warn!(
                    target = "codefolio::http::health",
                    error = %err,
                    "memory sampling failed"
                );
                MemoryUsage::default()
            }
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

fn read_memory(system: &Mutex<System>) -> MemoryUsage {
    let mut system = system.lock().unwrap_or_else(PoisonError::into_inner);
    system.refresh_memory();

    let rss_bytes = match sysinfo::get_current_pid() {
        Ok(pid) => {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
            system.process(pid).map(|process| process.memory()).unwrap_or(0)
        }
        Err(_) => 0,
    };

    MemoryUsage {
        rss_bytes,
        system_used_bytes: system.used_memory(),
        system_total_bytes: system.total_memory(),
    }
}

pub(super) async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: OffsetDateTime::now_utc(),
        memory: state.memory.sample().await,
    })
}
