use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SHADOW_PREFIX: &str = "panim-";

/// Private copy of a module file that the dynamic loader maps instead of the original.
///
/// Loading from a fresh path every time lets a rebuilt library at the original path be opened
/// while the previous image is still mapped. The copy is deleted on drop, which must happen after
/// the library handle is closed.
#[derive(Debug)]
pub(crate) struct ShadowCopy {
    path: PathBuf,
}

impl ShadowCopy {
    pub(crate) fn create(dir: &Path, source: &Path, generation: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "module path has no file name"))?;
        let path = dir.join(format!(
            "{SHADOW_PREFIX}{}-{generation}-{}",
            std::process::id(),
            file_name.to_string_lossy()
        ));
        fs::copy(source, &path)?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ShadowCopy {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to remove plugin shadow copy");
        }
    }
}

/// Counters from one [`cleanup_stale_shadows`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowCleanupReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped_current_process: usize,
    pub skipped_recent: usize,
    pub skipped_unrecognized: usize,
}

impl ShadowCleanupReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Delete shadow copies left behind by other processes.
///
/// Files owned by this process and files modified within `grace` are kept, so a concurrently
/// running host does not lose the copy it is about to map.
pub(crate) fn cleanup_stale_shadows(dir: &Path, grace: Duration) -> ShadowCleanupReport {
    let mut report = ShadowCleanupReport::default();
    let Ok(entries) = fs::read_dir(dir) else {
        return report;
    };
    let own_pid = std::process::id();
    let now = SystemTime::now();

    for entry in entries.filter_map(Result::ok) {
        report.scanned += 1;
        let name = entry.file_name();
        let Some(pid) = shadow_owner_pid(&name.to_string_lossy()) else {
            report.skipped_unrecognized += 1;
            continue;
        };
        if pid == own_pid {
            report.skipped_current_process += 1;
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < grace {
            report.skipped_recent += 1;
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => report.deleted += 1,
            Err(_) => report.failed += 1,
        }
    }
    report
}

fn shadow_owner_pid(file_name: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(SHADOW_PREFIX)?;
    let mut parts = rest.splitn(3, '-');
    let pid = parts.next()?.parse().ok()?;
    parts.next()?.parse::<u64>().ok()?;
    parts.next().filter(|s| !s.is_empty())?;
    Some(pid)
}
