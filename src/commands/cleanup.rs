//! Remove the scan result files and forget cached entities.

use std::fmt;

use tracing::info;

use crate::context::CleanerContext;
use crate::error::Result;
use crate::remote::RemoteClient;
use crate::storage::SCAN_FILES;

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<&'static str>,
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed.is_empty() {
            write!(f, "nothing to remove")
        } else {
            write!(f, "removed {}", self.removed.join(", "))
        }
    }
}

pub fn run<C: RemoteClient>(ctx: &CleanerContext<C>) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    for name in SCAN_FILES {
        if ctx.storage().remove(name)? {
            info!("🗑️ Removed {}", name);
            report.removed.push(name);
        }
    }
    ctx.invalidate(None);
    info!("✅ Cleanup: {}", report);
    Ok(report)
}
