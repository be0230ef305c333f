use crate::{checked_percent, Probe, Result, SourceError};
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use sysmonx_common::Sample;

/// Usage of the volume that holds the configured mount point.
pub struct DiskProbe {
    disks: Disks,
    mount: PathBuf,
}

/// Space figures of one mounted volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeUsage {
    pub mount_point: PathBuf,
    pub total: u64,
    pub available: u64,
}

impl DiskProbe {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
            mount: mount.into(),
        }
    }

    fn volumes(&self) -> Vec<VolumeUsage> {
        self.disks
            .iter()
            .map(|disk| VolumeUsage {
                mount_point: disk.mount_point().to_path_buf(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect()
    }
}

impl Probe for DiskProbe {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn read(&mut self, sample: &mut Sample) -> Result<()> {
        self.disks.refresh();
        let mut volume = select_volume(&self.volumes(), &self.mount);
        if volume.is_none() {
            // The volume may have been mounted after startup.
            self.disks.refresh_list();
            volume = select_volume(&self.volumes(), &self.mount);
        }

        let volume = volume.ok_or_else(|| SourceError::Probe {
            probe: "disk",
            reason: format!("no volume mounted at {}", self.mount.display()),
        })?;
        if volume.total == 0 {
            return Err(SourceError::Probe {
                probe: "disk",
                reason: format!("{} reports 0 bytes total", volume.mount_point.display()),
            });
        }

        let used = volume.total.saturating_sub(volume.available);
        sample.disk_total_bytes = Some(volume.total);
        sample.disk_used_bytes = Some(used);
        sample.disk_percent = checked_percent((used as f64 / volume.total as f64) * 100.0);

        Ok(())
    }
}

/// Pick the volume whose mount point is the longest prefix of `target`, the
/// same resolution `df` applies to a path.
pub fn select_volume(volumes: &[VolumeUsage], target: &Path) -> Option<VolumeUsage> {
    volumes
        .iter()
        .filter(|v| target.starts_with(&v.mount_point))
        .max_by_key(|v| v.mount_point.components().count())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(mount: &str, total: u64, available: u64) -> VolumeUsage {
        VolumeUsage {
            mount_point: PathBuf::from(mount),
            total,
            available,
        }
    }

    #[test]
    fn select_volume_prefers_longest_mount_prefix() {
        let volumes = vec![
            volume("/", 100, 50),
            volume("/data", 1000, 10),
            volume("/data/archive", 5000, 4000),
        ];
        let selected = select_volume(&volumes, Path::new("/data/logs")).unwrap();
        assert_eq!(selected.mount_point, PathBuf::from("/data"));

        let selected = select_volume(&volumes, Path::new("/")).unwrap();
        assert_eq!(selected.mount_point, PathBuf::from("/"));
    }

    #[test]
    fn select_volume_matches_whole_components() {
        let volumes = vec![volume("/dat", 10, 5)];
        assert!(select_volume(&volumes, Path::new("/data")).is_none());
    }

    #[test]
    fn select_volume_without_volumes_is_none() {
        assert!(select_volume(&[], Path::new("/")).is_none());
    }
}
