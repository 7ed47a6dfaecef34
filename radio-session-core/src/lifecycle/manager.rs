use std::sync::Arc;

use parking_lot::Mutex;

use crate::capture::boundary::FailureBoundary;
use crate::handle::device_handle::DeviceHandle;
use crate::handle::last_error::LastError;
use crate::handle::streamer_handle::{RxStreamerHandle, TxStreamerHandle};
use crate::models::config::ManagerConfig;
use crate::models::error::SessionError;
use crate::models::slot::{Direction, SlotIndex};
use crate::models::stream::StreamArgs;
use crate::registry::resource_registry::{ResourceRegistry, Resolved, StreamObject};
use crate::traits::device_factory::DeviceFactory;
use crate::traits::device_session::DeviceSession;
use crate::traits::streamer::{RxStreamer, TxStreamer};

/// Create/destroy surface for device and streamer handles.
///
/// `make_device` and `free_device` serialize on one lifecycle lock. The lock
/// covers reservation, backend construction and insertion for makes, and
/// only the erase for frees: waiting for in-flight calls on the freed device
/// happens after the lock is released, so it never stalls a `make_device`
/// for an unrelated device.
pub struct HandleManager {
    registry: Arc<ResourceRegistry>,
    factory: Arc<dyn DeviceFactory>,
    boundary: FailureBoundary,
    lifecycle: Mutex<()>,
}

impl HandleManager {
    /// Manager over the process-wide registry with default configuration.
    pub fn new(factory: Arc<dyn DeviceFactory>) -> Self {
        Self::with_registry(ResourceRegistry::global(), factory, ManagerConfig::default())
    }

    pub fn with_registry(registry: Arc<ResourceRegistry>, factory: Arc<dyn DeviceFactory>, config: ManagerConfig) -> Self {
        if let Err(e) = config.validate() {
            log::warn!("invalid manager config ({}), using defaults", e);
            return Self::with_registry(registry, factory, ManagerConfig::default());
        }
        Self {
            registry,
            factory,
            boundary: FailureBoundary::new(&config),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub(crate) fn boundary(&self) -> &FailureBoundary {
        &self.boundary
    }

    /// Ask the backend which devices match `args`.
    pub fn find_devices(&self, args: &str) -> Result<Vec<String>, SessionError> {
        self.boundary.call("find_devices", || self.factory.find(args))
    }

    /// Construct a device session and return a handle to it.
    ///
    /// A failed construction consumes its reserved index and leaves nothing
    /// in the registry; no handle is returned.
    pub fn make_device(&self, args: &str) -> Result<DeviceHandle, SessionError> {
        let _lifecycle = self.lifecycle.lock();

        let index = self.registry.reserve_device_slot();
        let session = self
            .boundary
            .call("make_device", || self.factory.make(args))
            .map_err(|e| match e {
                SessionError::BackendOperationFailed { message, .. } => SessionError::DeviceConstructionFailed(message),
                other => other,
            })
            .inspect_err(|e| log::warn!("device construction for slot {} failed: {}", index, e))?;

        self.registry.insert_device(index, session)?;
        log::info!("created device {} from args \"{}\"", index, args);
        Ok(DeviceHandle::new(index))
    }

    /// Destroy the device behind `handle` and every streamer it owns.
    ///
    /// Blocks until calls already running on this device have returned.
    /// The handle stays usable as a token, but every later operation through
    /// it (including another `free_device`) fails with `InvalidDevice`.
    pub fn free_device(&self, handle: &DeviceHandle) -> Result<(), SessionError> {
        let erased = {
            let _lifecycle = self.lifecycle.lock();
            self.registry.erase_device(handle.index())
        };
        let entry = self.boundary.record(handle.error_slot(), "free_device", erased)?;

        entry.retire();
        drop(entry);
        log::info!("destroyed device {}", handle.index());
        Ok(())
    }

    /// Build an RX streamer on the device and return a handle to it.
    pub fn make_rx_stream(&self, device: &DeviceHandle, args: &StreamArgs) -> Result<RxStreamerHandle, SessionError> {
        let position = self.make_stream(device, args, Direction::Rx)?;
        Ok(RxStreamerHandle::new(device.index(), position))
    }

    /// Build a TX streamer on the device and return a handle to it.
    pub fn make_tx_stream(&self, device: &DeviceHandle, args: &StreamArgs) -> Result<TxStreamerHandle, SessionError> {
        let position = self.make_stream(device, args, Direction::Tx)?;
        Ok(TxStreamerHandle::new(device.index(), position))
    }

    /// Release a caller-side RX streamer handle.
    ///
    /// The streamer itself stays with its device until the device is freed,
    /// so positions of other streamers never shift.
    pub fn free_rx_stream(&self, handle: RxStreamerHandle) -> Result<(), SessionError> {
        log::debug!("released rx streamer handle {:?}", handle.location());
        drop(handle);
        Ok(())
    }

    /// Release a caller-side TX streamer handle. See [`Self::free_rx_stream`].
    pub fn free_tx_stream(&self, handle: TxStreamerHandle) -> Result<(), SessionError> {
        log::debug!("released tx streamer handle {:?}", handle.location());
        drop(handle);
        Ok(())
    }

    fn make_stream(&self, device: &DeviceHandle, args: &StreamArgs, dir: Direction) -> Result<usize, SessionError> {
        let op = match dir {
            Direction::Rx => "get_rx_stream",
            Direction::Tx => "get_tx_stream",
        };
        let result = self.registry.lookup_device(device.index()).and_then(|resolved| {
            let stream = resolved.with(|session| {
                self.boundary.call(op, || match dir {
                    Direction::Rx => session.rx_stream(args).map(StreamObject::Rx),
                    Direction::Tx => session.tx_stream(args).map(StreamObject::Tx),
                })
            })??;
            self.registry.append_stream(device.index(), stream)
        });
        let position = self.boundary.record(device.error_slot(), op, result)?;
        log::debug!(
            "created {} streamer {} on device {} (channels {:?})",
            dir,
            position,
            device.index(),
            args.effective_channels()
        );
        Ok(position)
    }

    // --- forwarding plumbing shared by the ops views ---

    /// Resolve, invoke inside the failure boundary, and record any error on `slot`.
    pub(crate) fn forward<O: ?Sized, T>(
        &self,
        slot: &LastError,
        op: &str,
        resolved: Result<Resolved<Arc<O>>, SessionError>,
        f: impl FnOnce(&O) -> Result<T, crate::models::error::BackendFault>,
    ) -> Result<T, SessionError> {
        let result = resolved.and_then(|resolved| resolved.with(|object| self.boundary.call(op, || f(object.as_ref())))?);
        if let Err(ref e) = result {
            if e.is_invalid_handle() {
                log::warn!("{} on a stale handle: {}", op, e);
            }
        }
        self.boundary.record(slot, op, result)
    }

    pub(crate) fn resolve_device(&self, index: SlotIndex) -> Result<Resolved<Arc<dyn DeviceSession>>, SessionError> {
        self.registry.lookup_device(index)
    }

    pub(crate) fn resolve_rx(&self, handle: &RxStreamerHandle) -> Result<Resolved<Arc<dyn RxStreamer>>, SessionError> {
        self.registry.lookup_rx_stream(handle.device_index(), handle.position())
    }

    pub(crate) fn resolve_tx(&self, handle: &TxStreamerHandle) -> Result<Resolved<Arc<dyn TxStreamer>>, SessionError> {
        self.registry.lookup_tx_stream(handle.device_index(), handle.position())
    }
}
