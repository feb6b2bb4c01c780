//! Background dispatcher
//!
//! Runs row persistence and CRM forwarding off the request path. Submission
//! never waits: the task is spawned right away and takes a semaphore permit
//! inside, so at most `max_concurrency` jobs talk to external services at
//! once. Errors and panics stop at the task boundary and are only logged.
//!
//! Jobs run on the runtime that created the dispatcher, not on the actix
//! worker that accepted the request, so stopping the workers does not
//! cancel them.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::crm::{CrmForwarder, CrmPayload};
use crate::errors::Result;
use crate::events::EventRecord;
use crate::store::RecordStore;

/// 递减在途计数，归零时唤醒 drain
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    runtime: Handle,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Dispatcher {
    /// 必须在 tokio runtime 内调用
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            runtime: Handle::current(),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Spawn `job` in the background. Returns immediately.
    pub fn spawn<F>(&self, job_name: &'static str, job: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        };
        let semaphore = Arc::clone(&self.semaphore);

        self.runtime.spawn(async move {
            let _guard = guard;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!(job = job_name, "Dispatcher closed, job dropped");
                return;
            };

            match AssertUnwindSafe(job).catch_unwind().await {
                Ok(Ok(())) => debug!(job = job_name, "Background job finished"),
                Ok(Err(e)) => error!(job = job_name, error = %e, "Background job failed"),
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(job = job_name, panic = %msg, "Background job panicked");
                }
            }
        });
    }

    /// 后台写入表格
    pub fn submit_persist(&self, store: Arc<RecordStore>, record: EventRecord) {
        self.spawn("persist", async move {
            let click_id = record.click_id.clone();
            let event = record.event;
            match store.append(&record).await {
                Ok(handle) => {
                    info!(click_id = %click_id, %event, range = %handle.0, "Event row appended");
                    Ok(())
                }
                Err(e) => {
                    error!(click_id = %click_id, %event, error = %e, "Event row append failed");
                    Err(e)
                }
            }
        });
    }

    /// 后台转发到 CRM（转发器自身不会返回错误）
    pub fn submit_forward(&self, forwarder: Arc<CrmForwarder>, payload: CrmPayload) {
        self.spawn("crm_forward", async move {
            forwarder.forward(&payload).await;
            Ok(())
        });
    }

    /// 等待在途任务结束，超时返回 false
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait_idle = async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };

        let pending = self.in_flight();
        if pending > 0 {
            info!("Waiting for {} background jobs to finish", pending);
        }
        match tokio::time::timeout(timeout, wait_idle).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Shutdown timeout, {} background jobs still running",
                    self.in_flight()
                );
                false
            }
        }
    }
}
