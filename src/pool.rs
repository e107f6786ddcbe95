//! Bounded pool of reusable FTP connections.
//!
//! Admission is a counting semaphore sized to `max_connections`; an
//! (N+1)-th concurrent caller suspends until a connection is released.
//! Selection runs under a mutex that is held only for the in-memory
//! scan — all network I/O happens after the claimed connection has been
//! taken out of its slot.
//!
//! Selection policy for data-bearing commands, in order:
//! 1. an idle connection whose open data channel already serves the
//!    same command at the same offset (resume without any round trip);
//! 2. an idle connection with no data channel (only PASV + command
//!    needed, the control login is reused);
//! 3. any idle connection, force-aborting whatever its data channel
//!    was serving.
//!
//! Control-only commands use the same scan with tier 1 skipped.

use crate::connection::{Connection, DataChannel};
use crate::error::{FtpError, FtpResult};
use crate::protocol::{parse_pasv_reply, ControlChannel};
use crate::transport::Transport;
use crate::types::{PoolConfig, PoolStats};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// The bounded connection pool. Cheap to clone handles are not needed —
/// the filesystem driver owns one pool per mount and shares it by
/// reference.
pub struct FtpPool<T: Transport> {
    shared: Arc<Shared<T>>,
}

struct Shared<T: Transport> {
    transport: T,
    config: PoolConfig,
    slots: Mutex<Vec<Option<Connection<T::Stream>>>>,
    admission: Arc<Semaphore>,
}

/// Which tier of the selection policy matched.
enum Claim {
    /// Data channel already positioned for the requested command/offset.
    Resume,
    /// No data channel on the selected connection.
    Fresh,
    /// Idle connection reclaimed from an unrelated transfer.
    Reclaim,
}

impl<T: Transport> FtpPool<T> {
    pub fn new(config: PoolConfig, transport: T) -> Self {
        let n = config.max_connections.max(1);
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || Some(Connection::default()));
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                slots: Mutex::new(slots),
                admission: Arc::new(Semaphore::new(n)),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Snapshot of slot states.
    pub fn stats(&self) -> PoolStats {
        let slots = self.shared.lock_slots();
        let mut connected = 0;
        let mut data_open = 0;
        let mut claimed = 0;
        for slot in slots.iter() {
            match slot {
                None => claimed += 1,
                Some(c) => {
                    if c.has_control() {
                        connected += 1;
                    }
                    if c.data().is_some() {
                        data_open += 1;
                    }
                }
            }
        }
        PoolStats {
            connected,
            data_open,
            claimed,
            max_connections: slots.len() as u32,
        }
    }

    /// Drop every pooled connection and close admission; operations in
    /// flight finish, later acquisitions fail with a connection error.
    pub fn shutdown(&self) {
        self.shared.admission.close();
        let mut slots = self.shared.lock_slots();
        for slot in slots.iter_mut() {
            if let Some(conn) = slot.as_mut() {
                conn.close();
            }
        }
        log::debug!("pool shut down, {} slots closed", slots.len());
    }

    /// Claim a connection for a control-only command.
    ///
    /// Suspends on admission, then establishes the control channel if
    /// the selected connection has never connected (or was torn down).
    pub async fn acquire(&self) -> FtpResult<PooledConn<T>> {
        let mut guard = self.claim(None).await?;
        if !guard.has_control() {
            self.establish(&mut guard).await?;
        }
        Ok(guard)
    }

    /// Claim a connection positioned for a data-bearing `command` at
    /// `offset`: control channel logged in, passive data channel open,
    /// REST applied, command accepted with 150.
    pub async fn acquire_data(&self, command: &str, offset: u64) -> FtpResult<PooledConn<T>> {
        let mut guard = self.claim(Some((command, offset))).await?;
        if guard.data().is_some() {
            // Tier-1 hit: the stream is already positioned.
            return Ok(guard);
        }
        if !guard.has_control() {
            self.establish(&mut guard).await?;
        }
        if let Err(e) = self.open_data(&mut guard, command, offset).await {
            guard.abort_data().await;
            return Err(e);
        }
        Ok(guard)
    }

    /// Suspend on admission, then scan-and-claim under the lock.
    /// A tier-3 claim aborts the victim's transfer after the lock is
    /// released.
    async fn claim(&self, wanted: Option<(&str, u64)>) -> FtpResult<PooledConn<T>> {
        let permit = self
            .shared
            .admission
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FtpError::connection("pool is shut down"))?;

        let (index, conn, tier) = {
            let mut slots = self.shared.lock_slots();
            let Some((index, tier)) = select_slot(&slots, wanted) else {
                // The permit guarantees at least one occupied slot.
                return Err(FtpError::connection("no idle connection slot"));
            };
            let conn = slots[index].take();
            (index, conn, tier)
        };

        let mut guard = PooledConn {
            shared: Arc::clone(&self.shared),
            index,
            conn,
            _permit: permit,
        };
        if let Claim::Reclaim = tier {
            log::debug!("slot {}: reclaiming connection mid-transfer", index);
            guard.abort_data().await;
        }
        Ok(guard)
    }

    /// Connect and log in: greeting 220, USER (230 immediate or 331
    /// then PASS → 230), then `TYPE I` → 200. Any failure tears the
    /// connection's sockets down before the error propagates.
    async fn establish(&self, conn: &mut Connection<T::Stream>) -> FtpResult<()> {
        let cfg = &self.shared.config;
        log::debug!("opening control channel to {}", cfg.control_addr());
        let stream = self
            .shared
            .transport
            .connect(&cfg.control_addr())
            .await
            .map_err(|e| {
                FtpError::connection(format!("connect to {}: {}", cfg.control_addr(), e))
            })?;
        conn.control = Some(ControlChannel::new(stream));

        if let Err(e) = self.login(conn).await {
            conn.close();
            return Err(e);
        }
        Ok(())
    }

    async fn login(&self, conn: &mut Connection<T::Stream>) -> FtpResult<()> {
        let cfg = &self.shared.config;

        let greeting = conn.recv().await?;
        if greeting.code != 220 {
            return Err(
                FtpError::connection(format!("unexpected greeting: {}", greeting.line))
                    .with_code(greeting.code),
            );
        }

        conn.send(&format!("USER {}", cfg.username)).await?;
        let reply = conn.recv().await?;
        match reply.code {
            230 => {}
            331 => {
                conn.send(&format!("PASS {}", cfg.password)).await?;
                let reply = conn.recv().await?;
                if reply.code != 230 {
                    return Err(FtpError::connection("login failed").with_code(reply.code));
                }
            }
            code => {
                return Err(FtpError::connection("USER rejected").with_code(code));
            }
        }

        conn.send("TYPE I").await?;
        let reply = conn.recv().await?;
        if reply.code != 200 {
            return Err(FtpError::connection("cannot set binary mode").with_code(reply.code));
        }
        Ok(())
    }

    /// Negotiate passive mode and start `command` at `offset`.
    async fn open_data(
        &self,
        conn: &mut Connection<T::Stream>,
        command: &str,
        offset: u64,
    ) -> FtpResult<()> {
        let reply = conn.expect("PASV", "PASV", 227).await?;
        let (ip, port) = parse_pasv_reply(&reply.line)?;

        let addr = format!("{}:{}", ip, port);
        log::debug!("opening data channel to {} for '{}'", addr, command);
        let stream = self
            .shared
            .transport
            .connect(&addr)
            .await
            .map_err(|e| FtpError::connection(format!("data connect to {}: {}", addr, e)))?;
        conn.data = Some(DataChannel {
            stream,
            command: command.to_string(),
            offset,
        });

        if offset != 0 {
            conn.expect(&format!("REST {}", offset), "REST", 350).await?;
        }
        conn.expect(command, command, 150).await?;
        Ok(())
    }
}

impl<T: Transport> Shared<T> {
    fn lock_slots(&self) -> MutexGuard<'_, Vec<Option<Connection<T::Stream>>>> {
        // The lock only guards brief in-memory scans; a poisoned lock
        // still holds consistent data.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scan the slots for an idle connection. Returns the slot index and
/// the tier that matched; `None` only if every slot is claimed, which
/// admission rules out.
fn select_slot<S>(
    slots: &[Option<Connection<S>>],
    wanted: Option<(&str, u64)>,
) -> Option<(usize, Claim)> {
    if let Some((command, offset)) = wanted {
        for (i, slot) in slots.iter().enumerate() {
            if let Some(conn) = slot {
                if let Some(data) = conn.data() {
                    if data.command == command && data.offset == offset {
                        return Some((i, Claim::Resume));
                    }
                }
            }
        }
    }
    for (i, slot) in slots.iter().enumerate() {
        if let Some(conn) = slot {
            if conn.data().is_none() {
                return Some((i, Claim::Fresh));
            }
        }
    }
    for (i, slot) in slots.iter().enumerate() {
        if slot.is_some() {
            return Some((i, Claim::Reclaim));
        }
    }
    None
}

/// A claimed connection. Dropping it returns the connection to its
/// slot and releases the admission token — channels stay open for
/// reuse.
pub struct PooledConn<T: Transport> {
    shared: Arc<Shared<T>>,
    index: usize,
    conn: Option<Connection<T::Stream>>,
    _permit: OwnedSemaphorePermit,
}

impl<T: Transport> Deref for PooledConn<T> {
    type Target = Connection<T::Stream>;

    fn deref(&self) -> &Self::Target {
        // The slot is vacated for exactly the guard's lifetime.
        self.conn.as_ref().expect("claimed connection present")
    }
}

impl<T: Transport> DerefMut for PooledConn<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("claimed connection present")
    }
}

impl<T: Transport> fmt::Debug for PooledConn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConn")
            .field("index", &self.index)
            .field("control", &self.has_control())
            .field("data", &self.data().map(|d| d.command.as_str()))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Drop for PooledConn<T> {
    fn drop(&mut self) {
        let mut slots = self.shared.lock_slots();
        slots[self.index] = self.conn.take();
    }
}
