use crate::{checked_percent, Probe, Result, SourceError};
use sysinfo::System;
use sysmonx_common::Sample;

pub struct MemoryProbe {
    system: System,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for MemoryProbe {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&mut self, sample: &mut Sample) -> Result<()> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        if total == 0 {
            return Err(SourceError::Probe {
                probe: "memory",
                reason: "total memory reported as 0".to_string(),
            });
        }

        sample.ram_total_bytes = Some(total);
        sample.ram_used_bytes = Some(used);
        sample.ram_percent = checked_percent((used as f64 / total as f64) * 100.0);

        Ok(())
    }
}
