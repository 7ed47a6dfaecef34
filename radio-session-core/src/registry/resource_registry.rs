use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::models::error::SessionError;
use crate::models::slot::{Direction, SlotIndex};
use crate::traits::device_session::DeviceSession;
use crate::traits::streamer::{RxStreamer, TxStreamer};

static GLOBAL_REGISTRY: LazyLock<Arc<ResourceRegistry>> = LazyLock::new(|| Arc::new(ResourceRegistry::new()));

/// Tracks in-flight forwarding calls on one device entry.
///
/// Forwarding holds the gate shared while the backend runs. Retiring the
/// gate flips `retired` and then takes it exclusively, which waits for every
/// call that entered before the flip. Calls that arrive afterwards are
/// refused.
#[derive(Debug, Default)]
pub struct ActivityGate {
    retired: AtomicBool,
    in_flight: RwLock<()>,
}

impl ActivityGate {
    fn new() -> Self {
        Self::default()
    }

    /// Run `f` unless the entry has been retired.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _active = self.in_flight.read();
        if self.retired.load(Ordering::Acquire) {
            return None;
        }
        Some(f())
    }

    /// Refuse new calls and block until in-flight calls have returned.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        drop(self.in_flight.write());
    }
}

/// A backend streamer of either direction, as stored in a device entry.
#[derive(Clone)]
pub enum StreamObject {
    Rx(Arc<dyn RxStreamer>),
    Tx(Arc<dyn TxStreamer>),
}

/// A backend object resolved from the registry, paired with the activity
/// gate of the device that owns it.
///
/// Holding a `Resolved` does not hold the registry lock.
pub struct Resolved<T> {
    object: T,
    gate: Arc<ActivityGate>,
}

impl<T> Resolved<T> {
    /// Run `f` against the object while the owning device is kept alive.
    ///
    /// Fails with `InvalidDevice` if the device was destroyed after the
    /// lookup but before `f` could start.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, SessionError> {
        self.gate
            .enter(|| f(&self.object))
            .ok_or(SessionError::InvalidDevice)
    }
}

/// One device session and the streamers created from it.
///
/// Streamers are append-only: a position, once handed out, keeps naming the
/// same streamer until the whole entry is erased.
pub struct DeviceEntry {
    session: Arc<dyn DeviceSession>,
    gate: Arc<ActivityGate>,
    rx_streamers: Vec<Arc<dyn RxStreamer>>,
    tx_streamers: Vec<Arc<dyn TxStreamer>>,
}

impl DeviceEntry {
    fn new(session: Arc<dyn DeviceSession>) -> Self {
        Self {
            session,
            gate: Arc::new(ActivityGate::new()),
            rx_streamers: Vec::new(),
            tx_streamers: Vec::new(),
        }
    }

    pub fn stream_count(&self, dir: Direction) -> usize {
        match dir {
            Direction::Rx => self.rx_streamers.len(),
            Direction::Tx => self.tx_streamers.len(),
        }
    }

    /// Refuse new calls on this entry and wait for in-flight ones.
    ///
    /// Called after the entry has left the registry, outside the registry lock.
    pub fn retire(&self) {
        self.gate.retire();
    }
}

struct RegistryInner {
    next_index: usize,
    devices: BTreeMap<SlotIndex, DeviceEntry>,
}

/// Maps slot indices to owned device entries.
///
/// Structural changes (reserve, insert, erase, append) take the lock
/// exclusively; lookups take it shared and return cloned `Arc`s, so backend
/// calls never run under the registry lock.
pub struct ResourceRegistry {
    inner: RwLock<RegistryInner>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                next_index: 0,
                devices: BTreeMap::new(),
            }),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<ResourceRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Allocate the next slot index. Indices are never reused.
    pub fn reserve_device_slot(&self) -> SlotIndex {
        let mut inner = self.inner.write();
        let index = SlotIndex::new(inner.next_index);
        inner.next_index += 1;
        index
    }

    /// Store a session under a previously reserved index.
    pub fn insert_device(&self, index: SlotIndex, session: Arc<dyn DeviceSession>) -> Result<(), SessionError> {
        let mut inner = self.inner.write();
        if index.get() >= inner.next_index {
            return Err(SessionError::Unknown(format!("slot {} was never reserved", index)));
        }
        if inner.devices.contains_key(&index) {
            return Err(SessionError::Unknown(format!("slot {} is already occupied", index)));
        }
        inner.devices.insert(index, DeviceEntry::new(session));
        Ok(())
    }

    pub fn lookup_device(&self, index: SlotIndex) -> Result<Resolved<Arc<dyn DeviceSession>>, SessionError> {
        let inner = self.inner.read();
        let entry = inner.devices.get(&index).ok_or(SessionError::InvalidDevice)?;
        Ok(Resolved {
            object: Arc::clone(&entry.session),
            gate: Arc::clone(&entry.gate),
        })
    }

    /// Remove a device entry and hand it back to the caller.
    ///
    /// The returned entry still owns the session and its streamers; dropping
    /// it releases them. Erasing an index twice fails with `InvalidDevice`.
    pub fn erase_device(&self, index: SlotIndex) -> Result<DeviceEntry, SessionError> {
        self.inner
            .write()
            .devices
            .remove(&index)
            .ok_or(SessionError::InvalidDevice)
    }

    /// Append a streamer to its device's list and return its position.
    pub fn append_stream(&self, index: SlotIndex, stream: StreamObject) -> Result<usize, SessionError> {
        let mut inner = self.inner.write();
        let entry = inner.devices.get_mut(&index).ok_or(SessionError::InvalidDevice)?;
        let position = match stream {
            StreamObject::Rx(rx) => {
                entry.rx_streamers.push(rx);
                entry.rx_streamers.len() - 1
            }
            StreamObject::Tx(tx) => {
                entry.tx_streamers.push(tx);
                entry.tx_streamers.len() - 1
            }
        };
        Ok(position)
    }

    /// Resolve a streamer. A missing device yields `InvalidDevice`; a
    /// position the device never handed out yields `InvalidHandle`.
    pub fn lookup_stream(
        &self,
        index: SlotIndex,
        dir: Direction,
        position: usize,
    ) -> Result<Resolved<StreamObject>, SessionError> {
        let inner = self.inner.read();
        let entry = inner.devices.get(&index).ok_or(SessionError::InvalidDevice)?;
        let object = match dir {
            Direction::Rx => entry.rx_streamers.get(position).cloned().map(StreamObject::Rx),
            Direction::Tx => entry.tx_streamers.get(position).cloned().map(StreamObject::Tx),
        }
        .ok_or(SessionError::InvalidHandle)?;
        Ok(Resolved {
            object,
            gate: Arc::clone(&entry.gate),
        })
    }

    pub fn lookup_rx_stream(&self, index: SlotIndex, position: usize) -> Result<Resolved<Arc<dyn RxStreamer>>, SessionError> {
        let resolved = self.lookup_stream(index, Direction::Rx, position)?;
        match resolved.object {
            StreamObject::Rx(rx) => Ok(Resolved {
                object: rx,
                gate: resolved.gate,
            }),
            StreamObject::Tx(_) => Err(SessionError::InvalidHandle),
        }
    }

    pub fn lookup_tx_stream(&self, index: SlotIndex, position: usize) -> Result<Resolved<Arc<dyn TxStreamer>>, SessionError> {
        let resolved = self.lookup_stream(index, Direction::Tx, position)?;
        match resolved.object {
            StreamObject::Tx(tx) => Ok(Resolved {
                object: tx,
                gate: resolved.gate,
            }),
            StreamObject::Rx(_) => Err(SessionError::InvalidHandle),
        }
    }

    pub fn contains(&self, index: SlotIndex) -> bool {
        self.inner.read().devices.contains_key(&index)
    }

    /// Number of live device entries.
    pub fn len(&self) -> usize {
        self.inner.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stream_count(&self, index: SlotIndex, dir: Direction) -> Result<usize, SessionError> {
        let inner = self.inner.read();
        let entry = inner.devices.get(&index).ok_or(SessionError::InvalidDevice)?;
        Ok(entry.stream_count(dir))
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
