//! Host-level resource limits.
//!
//! A detached watchdog aborts the whole process when the wall-clock or
//! memory budget is exceeded; the checker itself never checkpoints, and
//! interpretation writes are monotone, so a hard abort is safe.

use rsmcheck_check::logging::{Logger, info, warn};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn the watchdog. Limits of 0 are unlimited.
pub fn install(maxmem_mb: u64, maxtime_min: u64, logger: &Logger) {
    if maxmem_mb == 0 && maxtime_min == 0 {
        return;
    }
    if maxmem_mb > 0 && !cfg!(target_os = "linux") {
        warn!(
            logger,
            "memory limits are only supported on Linux; --maxmem is ignored"
        );
    }
    let logger = logger.clone();
    let deadline = (maxtime_min > 0)
        .then(|| Instant::now() + Duration::from_secs(maxtime_min * 60));

    std::thread::spawn(move || {
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    info!(logger, "timeout");
                    eprintln!("rsmcheck: timeout");
                    std::process::exit(1);
                }
            }
            if maxmem_mb > 0 {
                if let Some(resident) = resident_mb() {
                    if resident > maxmem_mb {
                        info!(logger, "memout");
                        eprintln!("rsmcheck: memory limit exceeded");
                        std::process::exit(1);
                    }
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    });
}

/// Resident set size in MB, from the proc filesystem.
#[cfg(target_os = "linux")]
fn resident_mb() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096 / (1024 * 1024))
}

#[cfg(not(target_os = "linux"))]
fn resident_mb() -> Option<u64> {
    None
}
