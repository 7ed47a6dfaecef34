use std::time::Duration;

use crate::handle::streamer_handle::{RxStreamerHandle, TxStreamerHandle};
use crate::lifecycle::manager::HandleManager;
use crate::models::error::{BackendFault, SessionError};
use crate::models::metadata::{AsyncMetadata, RxMetadata, TxMetadata};
use crate::models::stream::StreamCommand;
use crate::traits::streamer::{RxStreamer, TxStreamer};

type OpResult<T> = Result<T, SessionError>;

/// Forwarding view over one RX streamer handle.
pub struct RxStreamerOps<'a> {
    manager: &'a HandleManager,
    handle: &'a RxStreamerHandle,
}

/// Forwarding view over one TX streamer handle.
pub struct TxStreamerOps<'a> {
    manager: &'a HandleManager,
    handle: &'a TxStreamerHandle,
}

impl HandleManager {
    pub fn rx_streamer<'a>(&'a self, handle: &'a RxStreamerHandle) -> RxStreamerOps<'a> {
        RxStreamerOps { manager: self, handle }
    }

    pub fn tx_streamer<'a>(&'a self, handle: &'a TxStreamerHandle) -> TxStreamerOps<'a> {
        TxStreamerOps { manager: self, handle }
    }
}

impl RxStreamerOps<'_> {
    fn call<T>(&self, op: &str, f: impl FnOnce(&(dyn RxStreamer + 'static)) -> Result<T, BackendFault>) -> OpResult<T> {
        let resolved = self.manager.resolve_rx(self.handle);
        self.manager.forward(self.handle.error_slot(), op, resolved, f)
    }

    pub fn num_channels(&self) -> OpResult<usize> {
        self.call("rx_streamer_num_channels", |rx| Ok(rx.num_channels()))
    }

    pub fn max_num_samps(&self) -> OpResult<usize> {
        self.call("rx_streamer_max_num_samps", |rx| Ok(rx.max_num_samps()))
    }

    /// Receive into one byte buffer per channel.
    ///
    /// The device stays alive for the whole call: a concurrent `free_device`
    /// of the parent waits for it to return. A timeout comes back as
    /// `Ok((0, md))` with `md.error_code == RxErrorCode::Timeout`.
    pub fn recv(
        &self,
        buffs: &mut [&mut [u8]],
        nsamps_per_buff: usize,
        timeout: Duration,
        one_packet: bool,
    ) -> OpResult<(usize, RxMetadata)> {
        self.call("rx_streamer_recv", |rx| {
            if buffs.len() != rx.num_channels() {
                return Err(BackendFault::value(format!(
                    "expected {} channel buffers, got {}",
                    rx.num_channels(),
                    buffs.len()
                )));
            }
            rx.recv(buffs, nsamps_per_buff, timeout, one_packet)
        })
    }

    pub fn issue_stream_cmd(&self, cmd: &StreamCommand) -> OpResult<()> {
        self.call("rx_streamer_issue_stream_cmd", |rx| rx.issue_stream_cmd(cmd))
    }
}

impl TxStreamerOps<'_> {
    fn call<T>(&self, op: &str, f: impl FnOnce(&(dyn TxStreamer + 'static)) -> Result<T, BackendFault>) -> OpResult<T> {
        let resolved = self.manager.resolve_tx(self.handle);
        self.manager.forward(self.handle.error_slot(), op, resolved, f)
    }

    pub fn num_channels(&self) -> OpResult<usize> {
        self.call("tx_streamer_num_channels", |tx| Ok(tx.num_channels()))
    }

    pub fn max_num_samps(&self) -> OpResult<usize> {
        self.call("tx_streamer_max_num_samps", |tx| Ok(tx.max_num_samps()))
    }

    pub fn send(
        &self,
        buffs: &[&[u8]],
        nsamps_per_buff: usize,
        metadata: &TxMetadata,
        timeout: Duration,
    ) -> OpResult<usize> {
        self.call("tx_streamer_send", |tx| {
            if buffs.len() != tx.num_channels() {
                return Err(BackendFault::value(format!(
                    "expected {} channel buffers, got {}",
                    tx.num_channels(),
                    buffs.len()
                )));
            }
            tx.send(buffs, nsamps_per_buff, metadata, timeout)
        })
    }

    /// `Ok(None)` when no async event arrived within `timeout`.
    pub fn recv_async_msg(&self, timeout: Duration) -> OpResult<Option<AsyncMetadata>> {
        self.call("tx_streamer_recv_async_msg", |tx| tx.recv_async_msg(timeout))
    }
}
