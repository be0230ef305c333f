use crate::{Probe, Result};
use sysmonx_common::Sample;

/// Platform and user name. Both are read once; they do not change while the
/// process runs.
pub struct IdentityProbe {
    platform: Option<String>,
    username: Option<String>,
}

impl IdentityProbe {
    pub fn new() -> Self {
        Self {
            platform: Some(std::env::consts::OS.to_string()),
            username: current_username(),
        }
    }
}

impl Default for IdentityProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for IdentityProbe {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn read(&mut self, sample: &mut Sample) -> Result<()> {
        sample.platform = self.platform.clone();
        sample.username = self.username.clone();
        Ok(())
    }
}

fn current_username() -> Option<String> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn identity_fills_platform() {
        let mut probe = IdentityProbe::new();
        let mut sample = Sample::unavailable(Local::now());
        probe.read(&mut sample).unwrap();
        assert_eq!(sample.platform.as_deref(), Some(std::env::consts::OS));
    }
}
