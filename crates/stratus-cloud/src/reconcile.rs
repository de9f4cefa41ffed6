//! Status reconciliation
//!
//! Blocking poll-until-state primitives used by drivers after issuing an
//! eventually-consistent provider call. The wait runs on the caller's task
//! and yields at every sleep; callers that must not wait hand the work to the
//! task manager instead.

use crate::error::{CloudError, Result};
use crate::resource::{CloudResource, ResourceStatus};
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};

/// Lower bound between two checks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll interval and overall timeout for a reconciliation wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Wait until `resource` reports `desired`
pub async fn wait_status<R>(
    resource: &mut R,
    desired: ResourceStatus,
    interval: Duration,
    timeout: Duration,
) -> Result<()>
where
    R: CloudResource + ?Sized,
{
    wait_status_until(resource, desired, interval, timeout, None).await
}

/// Like [`wait_status`], bounded additionally by the caller's deadline
/// whichever comes first
pub async fn wait_status_until<R>(
    resource: &mut R,
    desired: ResourceStatus,
    interval: Duration,
    timeout: Duration,
    deadline: Option<Instant>,
) -> Result<()>
where
    R: CloudResource + ?Sized,
{
    tracing::debug!(
        "Waiting for {} to become {} (interval {:?}, timeout {:?})",
        resource.id(),
        desired,
        interval,
        timeout
    );
    wait_until(
        resource,
        PollConfig::new(interval, timeout),
        deadline,
        |r| r.status() == desired,
    )
    .await
    .map_err(|e| match e {
        CloudError::Timeout(msg) => CloudError::Timeout(format!("status {desired}: {msg}")),
        other => other,
    })
}

/// Refresh `resource` until `ready` holds
///
/// The first check happens immediately. Refresh errors are returned as-is.
pub async fn wait_until<R, F>(
    resource: &mut R,
    poll: PollConfig,
    deadline: Option<Instant>,
    mut ready: F,
) -> Result<()>
where
    R: CloudResource + ?Sized,
    F: FnMut(&R) -> bool + Send,
{
    let start = Instant::now();
    let deadline = effective_deadline(start, poll.timeout, deadline);
    let interval = poll.interval.max(MIN_POLL_INTERVAL);
    let mut checks = 0u32;

    if start >= deadline {
        return Err(timeout_error(resource.id(), checks, start, deadline));
    }

    loop {
        resource.refresh().await?;
        checks += 1;

        if ready(&*resource) {
            tracing::debug!("{} reached expected state after {} checks", resource.id(), checks);
            return Ok(());
        }

        if !pause(interval, deadline).await {
            return Err(timeout_error(resource.id(), checks, start, deadline));
        }
    }
}

/// Wait until refreshing `resource` reports `NotFound`
pub async fn wait_deleted<R>(resource: &mut R, poll: PollConfig) -> Result<()>
where
    R: CloudResource + ?Sized,
{
    let start = Instant::now();
    let deadline = start + poll.timeout;
    let interval = poll.interval.max(MIN_POLL_INTERVAL);
    let mut checks = 0u32;

    loop {
        match resource.refresh().await {
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} is gone", resource.id());
                return Ok(());
            }
            Err(e) => return Err(e),
            Ok(()) => checks += 1,
        }

        if !pause(interval, deadline).await {
            return Err(timeout_error(resource.id(), checks, start, deadline));
        }
    }
}

fn effective_deadline(start: Instant, timeout: Duration, caller: Option<Instant>) -> Instant {
    let own = start + timeout;
    match caller {
        Some(caller) if caller < own => caller,
        _ => own,
    }
}

/// Sleep one interval; returns false when the next check would not happen
/// before the deadline, after sleeping out the remainder
async fn pause(interval: Duration, deadline: Instant) -> bool {
    let next = Instant::now() + interval;
    if next >= deadline {
        sleep_until(deadline).await;
        return false;
    }
    sleep(interval).await;
    true
}

fn timeout_error(id: &str, checks: u32, start: Instant, deadline: Instant) -> CloudError {
    CloudError::Timeout(format!(
        "{} not reconciled after {} checks in {:?}",
        id,
        checks,
        deadline.saturating_duration_since(start)
    ))
}
