//! Periodic CPU sampling of a single router.

use crate::query_engine::{as_int, SnmpAgent};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// cpmCPUTotal5sec for the first CPU on Cisco IOS.
pub const CISCO_CPU_5SEC: &str = "1.3.6.1.4.1.9.9.109.1.1.1.1.5.1";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuSample {
    pub elapsed_secs: f64,
    pub cpu_percent: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSummary {
    pub average: f64,
    pub max: i64,
    pub min: i64,
}

#[derive(Debug, Default, Clone)]
pub struct CpuTrace {
    pub samples: Vec<CpuSample>,
}

impl CpuTrace {
    pub fn push(&mut self, elapsed: Duration, cpu_percent: i64) {
        // Tenths of a second are plenty at multi-second pacing.
        let elapsed_secs = (elapsed.as_secs_f64() * 10.0).round() / 10.0;
        self.samples.push(CpuSample {
            elapsed_secs,
            cpu_percent,
        });
    }

    pub fn summary(&self) -> Option<CpuSummary> {
        let values = self.samples.iter().map(|s| s.cpu_percent);
        let max = values.clone().max()?;
        let min = values.clone().min()?;
        let average = values.sum::<i64>() as f64 / self.samples.len() as f64;
        Some(CpuSummary { average, max, min })
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for sample in &self.samples {
            writer.serialize(sample)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Creating {}", path.display()))?;
        self.write_csv(file)
    }
}

/// Samples `oid` every `every` until `duration` has passed or Ctrl-C is hit.
///
/// Samples that fail or are not integers are logged and left out.
pub async fn monitor(
    agent: &SnmpAgent,
    oid: &str,
    duration: Duration,
    every: Duration,
) -> CpuTrace {
    let mut trace = CpuTrace::default();
    let start = Instant::now();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    while start.elapsed() < duration {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut interrupted => {
                info!("Monitoring interrupted, keeping {} samples", trace.samples.len());
                break;
            }
        }

        match agent.get(oid).await.and_then(|value| as_int(&value)) {
            Ok(cpu) => {
                trace.push(start.elapsed(), cpu);
                info!(
                    "Sample {}: {cpu}% at {:.1}s",
                    trace.samples.len(),
                    start.elapsed().as_secs_f64()
                );
            }
            Err(e) => warn!("CPU sample from {} failed: {e:#}", agent.address),
        }
    }

    trace
}
