//! Memory-pressure admission control
//!
//! Each worker consults the governor before processing a pulled message.
//! When the process's memory usage ratio exceeds the threshold the worker
//! abandons the message without acknowledging it and asks the governor to
//! relieve pressure. This is a heuristic valve, not a resource scheduler:
//! it knows nothing about how much memory the pending message needs, and
//! the relief pass is a best-effort hint with no guaranteed effect.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Pid, System};
use tracing::{info, warn};

/// Memory usage ratio above which consumption stops.
pub const MEMORY_THRESHOLD: f64 = 0.5;

/// Pause after a relief pass before the next poll.
const RELIEF_PAUSE: Duration = Duration::from_secs(1);

/// One reading of process memory against its ceiling.
#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    /// Bytes currently used by this process.
    pub used: u64,
    /// Configured hard ceiling, if any (e.g. a cgroup limit).
    pub limit: Option<u64>,
    /// Total memory available to the process; substitutes for the ceiling
    /// when no hard limit is configured.
    pub total: u64,
}

impl MemorySample {
    /// used / ceiling, with `total` standing in when no limit is set.
    pub fn usage_ratio(&self) -> f64 {
        let ceiling = self.limit.unwrap_or(self.total);
        if ceiling == 0 {
            return 0.0;
        }
        self.used as f64 / ceiling as f64
    }
}

/// Source of memory readings. Separated from the governor so tests can
/// inject fixed samples.
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Probe reading this process's resident set and the host/cgroup ceiling
/// via sysinfo.
pub struct ProcessMemoryProbe {
    system: Mutex<System>,
    pid: Pid,
}

impl ProcessMemoryProbe {
    pub fn new() -> std::io::Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let mut system = System::new();
        system.refresh_memory();
        Ok(Self {
            system: Mutex::new(system),
            pid,
        })
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn sample(&self) -> MemorySample {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
        let used = system.process(self.pid).map(|p| p.memory()).unwrap_or(0);
        let limit = system.cgroup_limits().map(|limits| limits.total_memory);
        MemorySample {
            used,
            limit,
            total: system.total_memory(),
        }
    }
}

/// Inline admission-control check consulted before each message.
#[derive(Clone)]
pub struct MemoryGovernor {
    probe: Arc<dyn MemoryProbe>,
    threshold: f64,
}

impl MemoryGovernor {
    pub fn new(probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            probe,
            threshold: MEMORY_THRESHOLD,
        }
    }

    /// Governor backed by this process's real memory readings.
    pub fn for_process() -> std::io::Result<Self> {
        Ok(Self::new(Arc::new(ProcessMemoryProbe::new()?)))
    }

    pub fn usage_ratio(&self) -> f64 {
        self.probe.sample().usage_ratio()
    }

    /// True when the worker should abandon the pulled message instead of
    /// processing it.
    pub fn should_stop_consuming(&self) -> bool {
        let ratio = self.usage_ratio();
        if ratio > self.threshold {
            warn!(
                "memory usage {:.0}% exceeds {:.0}%, pausing consumption",
                ratio * 100.0,
                self.threshold * 100.0
            );
            true
        } else {
            false
        }
    }

    /// Best-effort reclamation hint followed by a short fixed pause.
    ///
    /// Rust has no collector to nudge; buffers free as they drop, so the
    /// hint reduces to logging plus the pause that gives in-flight work a
    /// chance to release memory before the next poll.
    pub async fn relieve_pressure(&self) {
        info!("requesting memory reclamation before next poll");
        tokio::time::sleep(RELIEF_PAUSE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(MemorySample);

    impl MemoryProbe for FixedProbe {
        fn sample(&self) -> MemorySample {
            self.0
        }
    }

    fn governor(used: u64, limit: Option<u64>, total: u64) -> MemoryGovernor {
        MemoryGovernor::new(Arc::new(FixedProbe(MemorySample { used, limit, total })))
    }

    #[test]
    fn stops_above_half_usage() {
        assert!(governor(60, Some(100), 100).should_stop_consuming());
        assert!(!governor(50, Some(100), 100).should_stop_consuming());
        assert!(!governor(10, Some(100), 100).should_stop_consuming());
    }

    #[test]
    fn total_substitutes_when_no_limit_configured() {
        assert!(governor(600, None, 1000).should_stop_consuming());
        assert!(!governor(400, None, 1000).should_stop_consuming());
    }

    #[test]
    fn zero_ceiling_reads_as_no_pressure() {
        assert!(!governor(100, Some(0), 0).should_stop_consuming());
    }
}
