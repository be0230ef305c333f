use crate::{checked_percent, Probe, Result, SourceError};
use sysinfo::System;
use sysmonx_common::Sample;

/// Global CPU utilization, logical core count and current frequency.
pub struct CpuProbe {
    system: System,
}

impl CpuProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // Usage is computed from the delta between two refreshes; prime the
        // counters so the first tick already reports a real value.
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for CpuProbe {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn read(&mut self, sample: &mut Sample) -> Result<()> {
        self.system.refresh_cpu_all();

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SourceError::Probe {
                probe: "cpu",
                reason: "no CPUs reported".to_string(),
            });
        }

        sample.cpu_percent = checked_percent(self.system.global_cpu_usage() as f64);
        sample.cpu_count = u32::try_from(cpus.len()).ok();
        sample.cpu_freq_ghz = average_frequency_ghz(cpus.iter().map(|cpu| cpu.frequency()));

        Ok(())
    }
}

/// Mean of the per-core frequencies in GHz. Platforms that cannot report a
/// frequency return 0 MHz for every core, which maps to unavailable.
fn average_frequency_ghz(mhz: impl Iterator<Item = u64>) -> Option<f64> {
    let (sum, count) = mhz
        .filter(|f| *f > 0)
        .fold((0u64, 0u64), |(sum, count), f| (sum + f, count + 1));
    if count == 0 {
        return None;
    }
    Some(sum as f64 / count as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_frequency_ignores_unreported_cores() {
        let ghz = average_frequency_ghz([3000, 0, 3400].into_iter()).unwrap();
        assert!((ghz - 3.2).abs() < 1e-9);
    }

    #[test]
    fn no_frequency_is_unavailable() {
        assert_eq!(average_frequency_ghz([0, 0].into_iter()), None);
        assert_eq!(average_frequency_ghz(std::iter::empty()), None);
    }
}
