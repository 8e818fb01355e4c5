//! Admission gate shared by the listener and the dialer
//!
//! Guarantees at most one live connection per gate. Callers that find a
//! connection active (or another caller opening one) wait for a wakeup and
//! re-check; exactly one caller at a time holds the right to open.

use std::future::Future;
use std::pin::{pin, Pin};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::transport::{Open, ReopenConn};
use crate::{ReopenConfig, ReopenError, SerialAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// One caller holds the opener right and is (re)trying to open
    Opening,
    /// A connection is live; `generation` identifies its release token
    Active { generation: u64 },
    Closed,
}

#[derive(Debug)]
struct Inner {
    state: State,
    next_generation: u64,
}

/// Lock-guarded state plus the wake primitive.
///
/// The lock is only held for state transitions, never across an await.
#[derive(Debug)]
pub(crate) struct Admission {
    inner: Mutex<Inner>,
    wake: Notify,
}

impl Admission {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                next_generation: 0,
            }),
            wake: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Transitions are single assignments, a poisoned lock still holds a valid state
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.lock().state == State::Closed
    }

    /// Returns true if this call performed the close
    fn close(&self) -> bool {
        let previous = std::mem::replace(&mut self.lock().state, State::Closed);
        self.wake.notify_waiters();
        previous != State::Closed
    }

    /// Wait until this caller becomes the opener.
    ///
    /// A cancelled waiter leaves the state untouched.
    async fn claim<C: Future>(
        self: &Arc<Self>,
        mut cancel: Pin<&mut C>,
    ) -> Result<OpenerGuard, ReopenError> {
        loop {
            // Register before checking so a release between the check and
            // the await is not missed
            let mut notified = pin!(self.wake.notified());
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                let state = inner.state;
                match state {
                    State::Closed => return Err(ReopenError::Closed),
                    State::Idle => {
                        inner.state = State::Opening;
                        return Ok(OpenerGuard {
                            admission: Arc::clone(self),
                            armed: true,
                        });
                    }
                    State::Opening | State::Active { .. } => {}
                }
            }

            debug!("Connection busy, waiting for release");
            tokio::select! {
                biased;
                _ = cancel.as_mut() => return Err(ReopenError::Cancelled),
                () = notified.as_mut() => {}
            }
        }
    }

    /// Resolves once the gate is closed
    async fn closed(&self) {
        loop {
            let mut notified = pin!(self.wake.notified());
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// The right to open. Dropping it without activating hands the right back.
#[derive(Debug)]
pub(crate) struct OpenerGuard {
    admission: Arc<Admission>,
    armed: bool,
}

impl OpenerGuard {
    /// Opening -> Active. Fails if the gate was closed meanwhile.
    fn activate(mut self) -> Result<Release, ReopenError> {
        let generation = {
            let mut inner = self.admission.lock();
            if inner.state == State::Closed {
                return Err(ReopenError::Closed);
            }
            inner.next_generation += 1;
            inner.state = State::Active {
                generation: inner.next_generation,
            };
            inner.next_generation
        };
        self.armed = false;
        Ok(Release {
            admission: Arc::clone(&self.admission),
            generation: Some(generation),
        })
    }
}

impl Drop for OpenerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let abandoned = {
            let mut inner = self.admission.lock();
            if inner.state == State::Opening {
                inner.state = State::Idle;
                true
            } else {
                false
            }
        };
        if abandoned {
            debug!("Opener abandoned, handing the right to the next caller");
            self.admission.wake.notify_waiters();
        }
    }
}

/// Single-use release message from a connection back to its gate
#[derive(Debug)]
pub(crate) struct Release {
    admission: Arc<Admission>,
    generation: Option<u64>,
}

impl Release {
    /// Active -> Idle for this token's generation only. Later calls are no-ops.
    pub(crate) fn release(&mut self) {
        let Some(generation) = self.generation.take() else {
            return;
        };
        let released = {
            let mut inner = self.admission.lock();
            if inner.state == (State::Active { generation }) {
                inner.state = State::Idle;
                true
            } else {
                false
            }
        };
        if released {
            debug!("Connection {} released", generation);
            self.admission.wake.notify_waiters();
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.generation.is_some()
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open operation, local address and admission state of one listener or dialer
pub(crate) struct Gate<O> {
    open: O,
    addr: SerialAddr,
    config: ReopenConfig,
    admission: Arc<Admission>,
}

impl<O: Open> Gate<O> {
    pub(crate) fn new(open: O, addr: SerialAddr, config: ReopenConfig) -> Self {
        Self {
            open,
            addr,
            config,
            admission: Arc::new(Admission::new()),
        }
    }

    pub(crate) fn addr(&self) -> &SerialAddr {
        &self.addr
    }

    pub(crate) fn config(&self) -> &ReopenConfig {
        &self.config
    }

    /// Idempotent; wakes every waiter and any opener sleeping in backoff
    pub(crate) fn close(&self) {
        if self.admission.close() {
            info!("Closed {}", self.addr);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.admission.is_closed()
    }

    /// Wait for the slot, then open with backoff until success, close or cancel
    pub(crate) async fn connect<C: Future>(
        &self,
        remote: SerialAddr,
        cancel: C,
    ) -> Result<ReopenConn<O::Stream>, ReopenError> {
        let mut cancel = pin!(cancel);
        if cancel.as_mut().now_or_never().is_some() {
            return Err(ReopenError::Cancelled);
        }

        let guard = self.admission.claim(cancel.as_mut()).await?;
        debug!("Opener for {}", self.addr);

        let mut backoff = Backoff::from_config(&self.config);
        let mut attempt: u32 = 0;
        loop {
            if cancel.as_mut().now_or_never().is_some() {
                return Err(ReopenError::Cancelled);
            }
            if self.admission.is_closed() {
                return Err(ReopenError::Closed);
            }

            attempt += 1;
            match self.open.open().await {
                Ok(mut stream) => {
                    let release = match guard.activate() {
                        Ok(release) => release,
                        Err(err) => {
                            // Gate closed while opening; nobody will ever use this stream
                            if let Err(e) = stream.shutdown().await {
                                warn!("Failed to close discarded stream for {}: {}", self.addr, e);
                            }
                            return Err(err);
                        }
                    };
                    info!("Opened {} (attempt {})", self.addr, attempt);
                    return Ok(ReopenConn::new(stream, self.addr.clone(), remote, release));
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(
                        "Failed to open {} (attempt {}): {}, retrying in {:?}",
                        self.addr, attempt, err, delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.as_mut() => return Err(ReopenError::Cancelled),
                        () = self.admission.closed() => return Err(ReopenError::Closed),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
