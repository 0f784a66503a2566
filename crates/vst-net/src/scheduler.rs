//! The dedicated executor fleet — a fixed number of single-thread Tokio
//! runtimes, each pinned to its own OS thread, that every connection actor
//! is bound to for its whole lifetime.
//!
//! Mirrors the source driver's "vertx-like" executor affinity requirement:
//! a connection never migrates threads mid-life, so its actor never needs
//! to synchronize access to its own socket or message store against a
//! second concurrent poller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

/// A fleet of `size` single-thread runtimes, handed out round-robin.
pub struct SchedulerPool {
    handles: Vec<Handle>,
    // Each runtime is driven by a dedicated OS thread blocked on a pending
    // future forever; holding the `Arc` here (alongside the driving
    // thread's own clone) just keeps the handle valid for the pool's life.
    _runtimes: Vec<Arc<Runtime>>,
    next: AtomicUsize,
}

impl SchedulerPool {
    pub fn new(size: u32) -> std::io::Result<Self> {
        let size = size.max(1);
        let mut handles = Vec::with_capacity(size as usize);
        let mut runtimes = Vec::with_capacity(size as usize);

        for index in 0..size {
            let runtime = Arc::new(
                Builder::new_current_thread()
                    .enable_all()
                    .thread_name(format!("vst-executor-{index}"))
                    .build()?,
            );
            handles.push(runtime.handle().clone());

            let driver = runtime.clone();
            std::thread::Builder::new()
                .name(format!("vst-executor-{index}-driver"))
                .spawn(move || driver.block_on(std::future::pending::<()>()))?;

            runtimes.push(runtime);
        }

        Ok(Self { handles, _runtimes: runtimes, next: AtomicUsize::new(0) })
    }

    /// Returns the next executor handle in round-robin order.
    pub fn next_handle(&self) -> Handle {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.handles.len();
        self.handles[index].clone()
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }
}
