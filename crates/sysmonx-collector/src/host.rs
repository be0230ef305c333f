use crate::cpu::CpuProbe;
use crate::disk::DiskProbe;
use crate::identity::IdentityProbe;
use crate::memory::MemoryProbe;
use crate::{MetricsSource, Probe, Result, SourceError};
use chrono::Local;
use std::collections::HashSet;
use std::path::PathBuf;
use sysmonx_common::Sample;

/// Samples the local host through a list of probes.
pub struct HostMetricsSource {
    probes: Vec<Box<dyn Probe>>,
    /// Probes whose last read failed, so repeated failures log once.
    failing: HashSet<&'static str>,
}

impl HostMetricsSource {
    /// The standard probe set, reading disk usage for `disk_mount`.
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        Self::with_probes(vec![
            Box::new(CpuProbe::new()),
            Box::new(MemoryProbe::new()),
            Box::new(DiskProbe::new(disk_mount)),
            Box::new(IdentityProbe::new()),
        ])
    }

    pub fn with_probes(probes: Vec<Box<dyn Probe>>) -> Self {
        Self {
            probes,
            failing: HashSet::new(),
        }
    }
}

impl MetricsSource for HostMetricsSource {
    fn name(&self) -> &str {
        "host"
    }

    fn sample(&mut self) -> Result<Sample> {
        let mut sample = Sample::unavailable(Local::now());
        let mut failures = Vec::new();

        for probe in &mut self.probes {
            let name = probe.name();
            match probe.read(&mut sample) {
                Ok(()) => {
                    if self.failing.remove(name) {
                        tracing::info!(probe = name, "Probe recovered");
                    }
                }
                Err(e) => {
                    if self.failing.insert(name) {
                        tracing::warn!(probe = name, error = %e, "Probe failed, fields marked unavailable");
                    } else {
                        tracing::debug!(probe = name, error = %e, "Probe still failing");
                    }
                    failures.push(e.to_string());
                }
            }
        }

        if !self.probes.is_empty() && failures.len() == self.probes.len() {
            return Err(SourceError::Unavailable {
                source_name: self.name().to_string(),
                reason: failures.join("; "),
            });
        }

        Ok(sample)
    }
}
