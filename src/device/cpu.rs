use std::sync::Arc;

use crate::config::DeviceConfig;
use crate::device::task::DeviceTask;
use crate::device::task_pool::TaskPool;
use crate::device::tile_renderer::TileRenderer;
use crate::dispatch::cpu::{CpuCapabilities, CpuTier};
use crate::dispatch::tiers::FilterKernels;
use crate::foundation::error::EmberResult;
use crate::kernel::external::{BoundExternalKernels, ExternalKernels};
use crate::kernel::globals::KernelGlobals;

/// Immutable state shared by every job of a device.
#[derive(Debug)]
struct DeviceShared {
    globals: KernelGlobals,
    filter: FilterKernels,
    external: BoundExternalKernels,
}

/// CPU compute device.
///
/// Owns the worker pool and the kernel bindings. Tasks are split into one piece per worker (or
/// per chunk) and run asynchronously; [`CpuDevice::task_wait`] blocks until they are done.
#[derive(Debug)]
pub struct CpuDevice {
    pool: TaskPool,
    shared: Arc<DeviceShared>,
}

impl CpuDevice {
    /// Bind the kernels to the running CPU and start the workers.
    pub fn new(
        config: &DeviceConfig,
        globals: KernelGlobals,
        kernels: ExternalKernels,
    ) -> EmberResult<Self> {
        config.validate()?;
        globals.film.validate()?;
        globals.denoise.validate()?;

        let mut capabilities = CpuCapabilities::detect();
        if let Some(max) = config.max_kernel_tier {
            capabilities = capabilities.restricted_to(max);
        }
        let filter = FilterKernels::with_capabilities(capabilities);
        let external = BoundExternalKernels::bind(kernels, capabilities);
        let pool = TaskPool::new(config.threads)?;

        tracing::debug!(
            threads = pool.num_threads(),
            tier = %filter.tier(),
            "cpu device ready"
        );
        Ok(Self {
            pool,
            shared: Arc::new(DeviceShared {
                globals,
                filter,
                external,
            }),
        })
    }

    /// Split `task` and queue its pieces. Returns the number of pieces.
    pub fn task_add(&self, task: DeviceTask) -> EmberResult<usize> {
        task.validate()?;
        let pieces = task.split(self.pool.num_threads());
        let count = pieces.len();
        for piece in pieces {
            let shared = Arc::clone(&self.shared);
            let cancel = self.pool.cancel_flag();
            self.pool.push(move || {
                TileRenderer {
                    globals: &shared.globals,
                    filter: &shared.filter,
                    external: &shared.external,
                    task: &piece,
                    pool_cancel: &cancel,
                }
                .run();
            });
        }
        Ok(count)
    }

    /// Block until every queued piece has finished.
    pub fn task_wait(&self) {
        self.pool.wait_work();
    }

    /// Signal cancellation to running pieces and wait for them to drain.
    pub fn task_cancel(&self) {
        self.pool.cancel();
    }

    /// Tier the filter kernels were bound to.
    pub fn kernel_tier(&self) -> CpuTier {
        self.shared.filter.tier()
    }

    /// Worker count.
    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    /// Globals shared with the kernels.
    pub fn globals(&self) -> &KernelGlobals {
        &self.shared.globals
    }

    /// Jobs that ended by panicking.
    pub fn panicked_jobs(&self) -> usize {
        self.pool.panicked_jobs()
    }
}
