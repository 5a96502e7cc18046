use crate::cpu_monitor::CISCO_CPU_5SEC;
use crate::dhcp::DhcpPlan;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "lab_netman.toml";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub router_list: PathBuf,
    pub snapshot_path: PathBuf,
    pub snmp_timeout_secs: u64,
    pub capture: CaptureConfig,
    pub cpu: CpuConfig,
    pub dhcp: DhcpPlan,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router_list: PathBuf::from("router_list.csv"),
            snapshot_path: PathBuf::from("snapshot.json"),
            snmp_timeout_secs: 5,
            capture: CaptureConfig::default(),
            cpu: CpuConfig::default(),
            dhcp: DhcpPlan::default(),
        }
    }
}

/// Where to find the capture and how to name what it contains.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub path: PathBuf,
    pub address_prefix: String,
    pub interface_names: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lab5.pcap"),
            address_prefix: "2001:db8:1:".to_string(),
            interface_names: vec!["R2-F0/0".to_string(), "R3-F0/0".to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub router: String,
    pub oid: String,
    pub duration_secs: u64,
    pub interval_secs: u64,
    pub output: PathBuf,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            router: "R1".to_string(),
            oid: CISCO_CPU_5SEC.to_string(),
            duration_secs: 120,
            interval_secs: 5,
            output: PathBuf::from("cpu_usage.csv"),
        }
    }
}

impl CpuConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    /// Reads `path`; a missing file means every default applies.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Parsing {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_secs(self.snmp_timeout_secs)
    }
}
