//! OS resource ceilings for worker processes.

use plotbox_core::ResourceBudget;
#[cfg(target_os = "linux")]
use tracing::debug;

/// Lower the CPU, address-space and open-file ceilings of the current process.
///
/// Must only be called inside a worker. Soft and hard limits are set to the
/// same value, so the process cannot raise them again. Each requested value is
/// clamped to the current hard limit, which makes repeated calls harmless.
/// A limit that cannot be set is logged and skipped.
pub fn apply_resource_limits(budget: &ResourceBudget) {
    #[cfg(target_os = "linux")]
    {
        use nix::sys::resource::Resource;

        lower(Resource::RLIMIT_CPU, budget.cpu_seconds_ceil());
        lower(Resource::RLIMIT_AS, budget.memory_bytes);
        lower(Resource::RLIMIT_NOFILE, budget.max_open_files);
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = budget;
    }
}

#[cfg(target_os = "linux")]
fn lower(resource: nix::sys::resource::Resource, requested: u64) {
    use nix::sys::resource::{getrlimit, setrlimit};

    let value = match getrlimit(resource) {
        Ok((_, hard)) => clamp(requested, hard as u64),
        Err(e) => {
            debug!("getrlimit({:?}) failed: {}", resource, e);
            requested
        }
    };

    if let Err(e) = setrlimit(resource, value as _, value as _) {
        debug!("setrlimit({:?}, {}) failed: {}", resource, value, e);
    }
}

/// Never ask for more than the hard limit allows.
fn clamp(requested: u64, hard: u64) -> u64 {
    requested.min(hard)
}
