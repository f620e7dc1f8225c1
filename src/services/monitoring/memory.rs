//! Process memory sampling.

use crate::models::MemoryUsage;

/// Source of memory readings for health checks.
pub trait MemoryProbe: Send + Sync {
    /// Current usage, or `None` when the platform offers no reading.
    fn sample(&self) -> Option<MemoryUsage>;
}

/// Reads resident set size against total system memory from `/proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    #[cfg(target_os = "linux")]
    fn sample(&self) -> Option<MemoryUsage> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        Some(MemoryUsage {
            used_bytes: proc_field_kib(&status, "VmRSS:")? * 1024,
            total_bytes: proc_field_kib(&meminfo, "MemTotal:")? * 1024,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn sample(&self) -> Option<MemoryUsage> {
        None
    }
}

/// A probe that always reports the same reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(pub MemoryUsage);

impl FixedMemoryProbe {
    /// Reading at `percent` of a 1 GiB total.
    pub fn percent(percent: f64) -> Self {
        let total = 1024 * 1024 * 1024u64;
        Self(MemoryUsage {
            used_bytes: (total as f64 * percent / 100.0) as u64,
            total_bytes: total,
        })
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> Option<MemoryUsage> {
        Some(self.0)
    }
}

/// Parse a `Key:   1234 kB` line out of a `/proc` file.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn proc_field_kib(contents: &str, key: &str) -> Option<u64> {
    contents
        .lines()
        .find(|line| line.starts_with(key))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}
