//! Dependency health aggregation.
//!
//! Each backing store is wrapped in a [`HealthProbe`]. A check cycle pings
//! every probe concurrently under a per-probe timeout and folds the results
//! into one [`OverallStatus`]:
//!
//! 1. a mandatory probe is unhealthy → `unhealthy`
//! 2. any probe is unhealthy or unknown → `degraded`
//! 3. otherwise → `healthy`
//!
//! Readiness only looks at mandatory probes, so an optional store outage
//! degrades `/health` without failing `/ready`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

/// Per-probe deadline.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Status of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
    /// The dependency was never initialized.
    Unknown,
}

/// Status of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Whether a dependency's failure takes the whole system down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Mandatory,
    Optional,
}

/// Outcome of one probe in one check cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub message: String,
    pub latency_ms: f64,
}

/// A liveness check against one backing dependency.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Key under which the result is reported.
    fn name(&self) -> &str;

    fn criticality(&self) -> Criticality;

    /// Ping the dependency.
    ///
    /// `None` means the dependency was never initialized.
    async fn ping(&self) -> Option<anyhow::Result<()>>;
}

/// Full health report served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub timestamp: i64,
    pub services: BTreeMap<String, ProbeResult>,
    pub version: &'static str,
}

/// Readiness report served by `/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub timestamp: i64,
    pub services: BTreeMap<String, ProbeStatus>,
}

/// Fold probe outcomes into an overall status.
pub fn aggregate<'a>(
    results: impl IntoIterator<Item = (Criticality, &'a ProbeStatus)>,
) -> OverallStatus {
    let mut degraded = false;
    for (criticality, status) in results {
        match (criticality, status) {
            (Criticality::Mandatory, ProbeStatus::Unhealthy) => return OverallStatus::Unhealthy,
            (_, ProbeStatus::Unhealthy | ProbeStatus::Unknown) => degraded = true,
            (_, ProbeStatus::Healthy) => {}
        }
    }

    if degraded {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}

/// Runs a fixed set of probes.
#[derive(Clone)]
pub struct HealthAggregator {
    probes: Vec<Arc<dyn HealthProbe>>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            probes,
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the per-probe deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check every dependency.
    pub async fn check_all(&self) -> HealthReport {
        let results = self.run(|_| true).await;
        let status = aggregate(results.iter().map(|(c, _, r)| (*c, &r.status)));

        HealthReport {
            status,
            timestamp: chrono::Utc::now().timestamp(),
            services: results
                .into_iter()
                .map(|(_, name, result)| (name, result))
                .collect(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Check mandatory dependencies only; ready iff all are healthy.
    pub async fn readiness(&self) -> Readiness {
        let results = self.run(|c| c == Criticality::Mandatory).await;
        let ready = results
            .iter()
            .all(|(_, _, r)| r.status == ProbeStatus::Healthy);

        Readiness {
            ready,
            timestamp: chrono::Utc::now().timestamp(),
            services: results
                .into_iter()
                .map(|(_, name, result)| (name, result.status))
                .collect(),
        }
    }

    async fn run(
        &self,
        include: impl Fn(Criticality) -> bool,
    ) -> Vec<(Criticality, String, ProbeResult)> {
        // Spawn first so probes run concurrently, then collect in order.
        let handles: Vec<_> = self
            .probes
            .iter()
            .filter(|p| include(p.criticality()))
            .map(|probe| {
                let probe = Arc::clone(probe);
                let timeout = self.timeout;
                let name = probe.name().to_string();
                let criticality = probe.criticality();
                (
                    criticality,
                    name,
                    tokio::spawn(async move { run_probe(probe.as_ref(), timeout).await }),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (criticality, name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(probe = %name, error = %e, "health probe task failed");
                    ProbeResult {
                        status: ProbeStatus::Unhealthy,
                        message: "probe failed to complete".to_string(),
                        latency_ms: 0.0,
                    }
                }
            };
            results.push((criticality, name, result));
        }
        results
    }
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.probes.iter().map(|p| p.name()).collect();
        f.debug_struct("HealthAggregator")
            .field("probes", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}

async fn run_probe(probe: &dyn HealthProbe, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, probe.ping()).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    let (status, message) = match outcome {
        Ok(None) => (ProbeStatus::Unknown, "not initialized".to_string()),
        Ok(Some(Ok(()))) => (ProbeStatus::Healthy, "ok".to_string()),
        Ok(Some(Err(e))) => (ProbeStatus::Unhealthy, format!("{e:#}")),
        Err(_) => (
            ProbeStatus::Unhealthy,
            format!("timed out after {}s", timeout.as_secs()),
        ),
    };

    debug!(probe = probe.name(), ?status, latency_ms, "health probe");

    ProbeResult {
        status,
        message,
        latency_ms: (latency_ms * 100.0).round() / 100.0,
    }
}

/// Probe for a PostgreSQL pool.
pub struct PostgresProbe {
    name: &'static str,
    criticality: Criticality,
    pool: Option<PgPool>,
}

impl PostgresProbe {
    pub fn new(name: &'static str, criticality: Criticality, pool: Option<PgPool>) -> Self {
        Self {
            name,
            criticality,
            pool,
        }
    }
}

#[async_trait]
impl HealthProbe for PostgresProbe {
    fn name(&self) -> &str {
        self.name
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    async fn ping(&self) -> Option<anyhow::Result<()>> {
        let pool = self.pool.as_ref()?;
        Some(
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from),
        )
    }
}

/// Probe for a Redis connection.
pub struct RedisProbe {
    conn: Option<MultiplexedConnection>,
}

impl RedisProbe {
    pub fn new(conn: Option<MultiplexedConnection>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl HealthProbe for RedisProbe {
    fn name(&self) -> &str {
        "redis"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Mandatory
    }

    async fn ping(&self) -> Option<anyhow::Result<()>> {
        let mut conn = self.conn.clone()?;
        Some(
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from),
        )
    }
}
