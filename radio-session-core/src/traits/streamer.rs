use std::time::Duration;

use crate::models::error::BackendFault;
use crate::models::metadata::{AsyncMetadata, RxMetadata, TxMetadata};
use crate::models::stream::StreamCommand;

/// Receive side of a backend stream.
///
/// Buffers are raw bytes in the streamer's host format, one buffer per
/// channel. Implementations are shared behind `Arc` and must synchronize
/// internally.
pub trait RxStreamer: Send + Sync {
    fn num_channels(&self) -> usize;

    /// Largest number of samples a single packet carries.
    fn max_num_samps(&self) -> usize;

    /// Receive up to `nsamps_per_buff` samples into each channel buffer.
    ///
    /// A timeout is reported through `RxMetadata::error_code` with zero
    /// samples, not as a fault.
    fn recv(
        &self,
        buffs: &mut [&mut [u8]],
        nsamps_per_buff: usize,
        timeout: Duration,
        one_packet: bool,
    ) -> Result<(usize, RxMetadata), BackendFault>;

    fn issue_stream_cmd(&self, cmd: &StreamCommand) -> Result<(), BackendFault>;
}

/// Transmit side of a backend stream.
pub trait TxStreamer: Send + Sync {
    fn num_channels(&self) -> usize;

    fn max_num_samps(&self) -> usize;

    /// Send `nsamps_per_buff` samples from each channel buffer.
    /// Returns the number of samples accepted before `timeout`.
    fn send(
        &self,
        buffs: &[&[u8]],
        nsamps_per_buff: usize,
        metadata: &TxMetadata,
        timeout: Duration,
    ) -> Result<usize, BackendFault>;

    /// Wait up to `timeout` for an async event such as a burst ACK or underflow.
    fn recv_async_msg(&self, timeout: Duration) -> Result<Option<AsyncMetadata>, BackendFault>;
}
