//! Loopback streamers for the simulated device.
//!
//! Samples sent on TX channel `n` are queued for RX channel `n` of the same
//! device. Buffers are opaque bytes; no format conversion happens between
//! the two sides, so RX and TX are expected to use the same `cpu_format`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use radio_session_core::models::error::BackendFault;
use radio_session_core::models::metadata::{AsyncEventCode, AsyncMetadata, RxErrorCode, RxMetadata, TxMetadata};
use radio_session_core::models::stream::{StreamArgs, StreamCommand, StreamMode};
use radio_session_core::traits::streamer::{RxStreamer, TxStreamer};

use crate::ring_buffer::RingBuffer;

/// Per-channel loopback depth in bytes. A multiple of every item size.
const LOOPBACK_BYTES: usize = 1 << 20;

/// Largest simulated packet payload in bytes.
const MAX_PACKET_BYTES: usize = 8000;

/// Host-side item size in bytes.
fn cpu_item_size(args: &StreamArgs) -> Result<usize, BackendFault> {
    args.cpu_item_size()
        .ok_or_else(|| BackendFault::value(format!("unsupported cpu format \"{}\"", args.cpu_format)))
}

/// Over-the-wire item size in bytes.
fn wire_item_size(format: &str) -> Result<usize, BackendFault> {
    match format {
        "" | "sc16" => Ok(4),
        "sc12" => Ok(3),
        "sc8" => Ok(2),
        other => Err(BackendFault::value(format!("unsupported wire format \"{}\"", other))),
    }
}

/// Check that every channel exists and none is listed twice.
fn check_channels(side: &str, channels: &[usize], available: usize) -> Result<(), BackendFault> {
    for (i, &chan) in channels.iter().enumerate() {
        if chan >= available {
            return Err(BackendFault::index(format!(
                "{} channel {} out of range ({} available)",
                side, chan, available
            )));
        }
        if channels[..i].contains(&chan) {
            return Err(BackendFault::value(format!("{} channel {} listed more than once", side, chan)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Stopped,
    Continuous,
    Finite { remaining: usize, and_done: bool },
}

struct ChannelFifo {
    ring: RingBuffer<u8>,
    overflowed: bool,
    state: StreamState,
    burst_start: bool,
}

impl ChannelFifo {
    fn new() -> Self {
        Self {
            ring: RingBuffer::new(LOOPBACK_BYTES),
            overflowed: false,
            state: StreamState::Stopped,
            burst_start: false,
        }
    }

    fn ready_items(&self, item_size: usize) -> usize {
        let queued = self.ring.count() / item_size;
        match self.state {
            StreamState::Stopped => 0,
            StreamState::Continuous => queued,
            StreamState::Finite { remaining, .. } => queued.min(remaining),
        }
    }
}

/// Shared TX-to-RX sample path of one simulated device.
pub struct Loopback {
    fifos: Mutex<Vec<ChannelFifo>>,
    ready: Condvar,
}

impl Loopback {
    pub fn new(channels: usize) -> Self {
        Self {
            fifos: Mutex::new((0..channels).map(|_| ChannelFifo::new()).collect()),
            ready: Condvar::new(),
        }
    }

    pub fn num_channels(&self) -> usize {
        self.fifos.lock().len()
    }

    /// Apply a stream command to RX channel `chan`.
    pub fn issue_stream_cmd(&self, cmd: &StreamCommand, chan: usize) -> Result<(), BackendFault> {
        let mut fifos = self.fifos.lock();
        let count = fifos.len();
        let fifo = fifos
            .get_mut(chan)
            .ok_or_else(|| BackendFault::index(format!("rx channel {} out of range ({} available)", chan, count)))?;
        fifo.state = match cmd.mode {
            StreamMode::StartContinuous => StreamState::Continuous,
            StreamMode::StopContinuous => StreamState::Stopped,
            StreamMode::NumSampsAndDone => StreamState::Finite {
                remaining: cmd.num_samps,
                and_done: true,
            },
            StreamMode::NumSampsAndMore => StreamState::Finite {
                remaining: cmd.num_samps,
                and_done: false,
            },
        };
        fifo.burst_start = fifo.state != StreamState::Stopped;
        self.ready.notify_all();
        Ok(())
    }

    fn push(fifos: &mut MutexGuard<'_, Vec<ChannelFifo>>, chan: usize, bytes: &[u8]) {
        let Some(fifo) = fifos.get_mut(chan) else {
            log::trace!("dropping {} loopback bytes for unmapped channel {}", bytes.len(), chan);
            return;
        };
        if fifo.ring.write(bytes) > 0 {
            fifo.overflowed = true;
        }
    }

    fn ready_items(fifos: &[ChannelFifo], channels: &[usize], item_size: usize) -> usize {
        channels
            .iter()
            .map(|&c| fifos[c].ready_items(item_size))
            .min()
            .unwrap_or(0)
    }
}

/// RX side of the loopback.
pub struct SimRxStreamer {
    loopback: Arc<Loopback>,
    channels: Vec<usize>,
    item_size: usize,
    max_num_samps: usize,
}

impl SimRxStreamer {
    pub fn new(loopback: Arc<Loopback>, args: &StreamArgs) -> Result<Self, BackendFault> {
        let channels = args.effective_channels();
        check_channels("rx", &channels, loopback.num_channels())?;
        Ok(Self {
            loopback,
            channels,
            item_size: cpu_item_size(args)?,
            max_num_samps: MAX_PACKET_BYTES / wire_item_size(&args.otw_format)?,
        })
    }
}

impl RxStreamer for SimRxStreamer {
    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn max_num_samps(&self) -> usize {
        self.max_num_samps
    }

    fn recv(
        &self,
        buffs: &mut [&mut [u8]],
        nsamps_per_buff: usize,
        timeout: Duration,
        one_packet: bool,
    ) -> Result<(usize, RxMetadata), BackendFault> {
        let wanted_bytes = nsamps_per_buff * self.item_size;
        if let Some((chan, buf)) = buffs.iter().enumerate().find(|(_, b)| b.len() < wanted_bytes) {
            return Err(BackendFault::value(format!(
                "buffer for channel {} holds {} bytes, {} requested",
                chan,
                buf.len(),
                wanted_bytes
            )));
        }
        if nsamps_per_buff == 0 {
            return Ok((0, RxMetadata::default()));
        }

        let deadline = Instant::now().checked_add(timeout);
        let mut fifos = self.loopback.fifos.lock();
        let ready = loop {
            if self.channels.iter().any(|&c| fifos[c].overflowed) {
                for &c in &self.channels {
                    fifos[c].overflowed = false;
                }
                let md = RxMetadata {
                    error_code: RxErrorCode::Overflow,
                    ..RxMetadata::default()
                };
                return Ok((0, md));
            }
            let ready = Loopback::ready_items(&fifos, &self.channels, self.item_size);
            if ready > 0 {
                break ready;
            }
            let timed_out = match deadline {
                Some(deadline) => self.loopback.ready.wait_until(&mut fifos, deadline).timed_out(),
                None => {
                    self.loopback.ready.wait(&mut fifos);
                    false
                }
            };
            if timed_out && Loopback::ready_items(&fifos, &self.channels, self.item_size) == 0 {
                return Ok((0, RxMetadata::timeout()));
            }
        };

        let mut n = ready.min(nsamps_per_buff);
        if one_packet {
            n = n.min(self.max_num_samps);
        }

        let mut md = RxMetadata::default();
        for (buf, &c) in buffs.iter_mut().zip(&self.channels) {
            let fifo = &mut fifos[c];
            let copied = fifo.ring.read_into(&mut buf[..n * self.item_size]);
            if copied < n * self.item_size {
                log::warn!("rx channel {} short by {} bytes", c, n * self.item_size - copied);
                buf[copied..n * self.item_size].fill(0);
            }
            md.start_of_burst |= std::mem::take(&mut fifo.burst_start);
            if let StreamState::Finite { remaining, and_done } = fifo.state {
                let remaining = remaining.saturating_sub(n);
                fifo.state = if remaining == 0 {
                    md.end_of_burst |= and_done;
                    StreamState::Stopped
                } else {
                    StreamState::Finite { remaining, and_done }
                };
            }
        }
        Ok((n, md))
    }

    fn issue_stream_cmd(&self, cmd: &StreamCommand) -> Result<(), BackendFault> {
        for &chan in &self.channels {
            self.loopback.issue_stream_cmd(cmd, chan)?;
        }
        Ok(())
    }
}

/// TX side of the loopback. Bursts ended with `end_of_burst` are
/// acknowledged on the async message queue.
pub struct SimTxStreamer {
    loopback: Arc<Loopback>,
    channels: Vec<usize>,
    item_size: usize,
    max_num_samps: usize,
    events: Mutex<VecDeque<AsyncMetadata>>,
    event_ready: Condvar,
}

impl SimTxStreamer {
    pub fn new(loopback: Arc<Loopback>, args: &StreamArgs, available: usize) -> Result<Self, BackendFault> {
        let channels = args.effective_channels();
        check_channels("tx", &channels, available)?;
        Ok(Self {
            loopback,
            channels,
            item_size: cpu_item_size(args)?,
            max_num_samps: MAX_PACKET_BYTES / wire_item_size(&args.otw_format)?,
            events: Mutex::new(VecDeque::new()),
            event_ready: Condvar::new(),
        })
    }
}

impl TxStreamer for SimTxStreamer {
    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn max_num_samps(&self) -> usize {
        self.max_num_samps
    }

    fn send(
        &self,
        buffs: &[&[u8]],
        nsamps_per_buff: usize,
        metadata: &TxMetadata,
        _timeout: Duration,
    ) -> Result<usize, BackendFault> {
        let bytes = nsamps_per_buff * self.item_size;
        if let Some((chan, buf)) = buffs.iter().enumerate().find(|(_, b)| b.len() < bytes) {
            return Err(BackendFault::value(format!(
                "buffer for channel {} holds {} bytes, {} requested",
                chan,
                buf.len(),
                bytes
            )));
        }

        {
            let mut fifos = self.loopback.fifos.lock();
            for (buf, &c) in buffs.iter().zip(&self.channels) {
                Loopback::push(&mut fifos, c, &buf[..bytes]);
            }
        }
        self.loopback.ready.notify_all();

        if metadata.end_of_burst {
            let mut events = self.events.lock();
            events.extend((0..self.channels.len()).map(|channel| AsyncMetadata {
                channel,
                has_time_spec: metadata.has_time_spec,
                time_spec: metadata.time_spec,
                event_code: AsyncEventCode::BurstAck,
            }));
            self.event_ready.notify_all();
        }
        Ok(nsamps_per_buff)
    }

    fn recv_async_msg(&self, timeout: Duration) -> Result<Option<AsyncMetadata>, BackendFault> {
        let deadline = Instant::now().checked_add(timeout);
        let mut events = self.events.lock();
        loop {
            if let Some(event) = events.pop_front() {
                return Ok(Some(event));
            }
            match deadline {
                Some(deadline) => {
                    if self.event_ready.wait_until(&mut events, deadline).timed_out() {
                        return Ok(events.pop_front());
                    }
                }
                None => self.event_ready.wait(&mut events),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn pair(channels: usize) -> (SimRxStreamer, SimTxStreamer) {
        let loopback = Arc::new(Loopback::new(channels));
        let args = StreamArgs::new("sc16", "sc16").with_channels((0..channels).collect::<Vec<_>>());
        let rx = SimRxStreamer::new(Arc::clone(&loopback), &args).unwrap();
        let tx = SimTxStreamer::new(loopback, &args, channels).unwrap();
        (rx, tx)
    }

    #[test]
    fn stopped_receiver_times_out() {
        let (rx, tx) = pair(1);
        tx.send(&[&[1u8; 16][..]], 4, &TxMetadata::default(), Duration::ZERO).unwrap();

        let mut buf = [0u8; 16];
        let (n, md) = rx.recv(&mut [&mut buf[..]], 4, Duration::from_millis(5), false).unwrap();
        assert_eq!(n, 0);
        assert_eq!(md.error_code, RxErrorCode::Timeout);
    }

    #[test]
    fn loopback_delivers_sent_samples() {
        let (rx, tx) = pair(2);
        rx.issue_stream_cmd(&StreamCommand::start_continuous()).unwrap();

        let a: Vec<u8> = (0..16).collect();
        let b: Vec<u8> = (100..116).collect();
        assert_eq!(tx.send(&[&a[..], &b[..]], 4, &TxMetadata::default(), Duration::ZERO).unwrap(), 4);

        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        let (n, md) = rx
            .recv(&mut [&mut out_a[..], &mut out_b[..]], 8, Duration::from_millis(5), false)
            .unwrap();
        assert_eq!(n, 4);
        assert!(md.start_of_burst);
        assert_eq!(&out_a[..16], &a[..]);
        assert_eq!(&out_b[..16], &b[..]);
    }

    #[test]
    fn finite_command_ends_burst() {
        let (rx, tx) = pair(1);
        rx.issue_stream_cmd(&StreamCommand::num_samps_and_done(3)).unwrap();
        tx.send(&[&[7u8; 40][..]], 10, &TxMetadata::default(), Duration::ZERO).unwrap();

        let mut buf = [0u8; 40];
        let (n, md) = rx.recv(&mut [&mut buf[..]], 10, Duration::from_millis(5), false).unwrap();
        assert_eq!(n, 3);
        assert!(md.end_of_burst);

        let (n, md) = rx.recv(&mut [&mut buf[..]], 10, Duration::ZERO, false).unwrap();
        assert_eq!(n, 0);
        assert_eq!(md.error_code, RxErrorCode::Timeout);
    }

    #[test]
    fn recv_wakes_on_send() {
        let (rx, tx) = pair(1);
        rx.issue_stream_cmd(&StreamCommand::start_continuous()).unwrap();

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(&[&[9u8; 8][..]], 2, &TxMetadata::default(), Duration::ZERO).unwrap();
        });
        let mut buf = [0u8; 8];
        let (n, _) = rx.recv(&mut [&mut buf[..]], 2, Duration::from_secs(5), false).unwrap();
        sender.join().unwrap();
        assert_eq!(n, 2);
        assert_eq!(buf, [9u8; 8]);
    }

    #[test]
    fn end_of_burst_is_acknowledged() {
        let (_rx, tx) = pair(1);
        assert_eq!(tx.recv_async_msg(Duration::ZERO).unwrap(), None);

        let md = TxMetadata {
            end_of_burst: true,
            ..TxMetadata::default()
        };
        tx.send(&[&[0u8; 4][..]], 1, &md, Duration::ZERO).unwrap();
        let event = tx.recv_async_msg(Duration::from_millis(5)).unwrap().unwrap();
        assert_eq!(event.event_code, AsyncEventCode::BurstAck);
        assert_eq!(event.channel, 0);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let (rx, _tx) = pair(1);
        let mut buf = [0u8; 4];
        let err = rx.recv(&mut [&mut buf[..]], 2, Duration::ZERO, false).unwrap_err();
        assert_eq!(err.kind, radio_session_core::FaultKind::Value);
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let loopback = Arc::new(Loopback::new(1));
        assert!(SimRxStreamer::new(Arc::clone(&loopback), &StreamArgs::new("cf128", "sc16")).is_err());
        assert!(SimRxStreamer::new(loopback, &StreamArgs::default().with_channels([3])).is_err());
    }

    #[test]
    fn repeated_channels_are_rejected() {
        let loopback = Arc::new(Loopback::new(2));
        let args = StreamArgs::default().with_channels([0, 0]);
        let err = SimRxStreamer::new(Arc::clone(&loopback), &args).err().unwrap();
        assert_eq!(err.kind, radio_session_core::FaultKind::Value);
        assert!(err.message.contains("listed more than once"));

        let args = StreamArgs::default().with_channels([1, 0, 1]);
        let err = SimTxStreamer::new(loopback, &args, 2).err().unwrap();
        assert_eq!(err.kind, radio_session_core::FaultKind::Value);
    }

    #[test]
    fn finite_burst_shorter_than_request() {
        let (rx, tx) = pair(2);
        rx.issue_stream_cmd(&StreamCommand::num_samps_and_done(5)).unwrap();
        tx.send(&[&[1u8; 12][..], &[2u8; 12][..]], 3, &TxMetadata::default(), Duration::ZERO)
            .unwrap();

        let mut a = [0u8; 40];
        let mut b = [0u8; 40];
        let (n, md) = rx
            .recv(&mut [&mut a[..], &mut b[..]], 10, Duration::from_millis(5), false)
            .unwrap();
        assert_eq!(n, 3);
        assert!(!md.end_of_burst);
        assert_eq!(&a[..12], &[1u8; 12]);
        assert_eq!(&b[..12], &[2u8; 12]);

        tx.send(&[&[3u8; 12][..], &[4u8; 12][..]], 3, &TxMetadata::default(), Duration::ZERO)
            .unwrap();
        let (n, md) = rx
            .recv(&mut [&mut a[..], &mut b[..]], 10, Duration::from_millis(5), false)
            .unwrap();
        assert_eq!(n, 2);
        assert!(md.end_of_burst);
        assert_eq!(&b[..8], &[4u8; 8]);
    }

    #[test]
    fn max_num_samps_follows_wire_format() {
        let loopback = Arc::new(Loopback::new(1));
        let rx = SimRxStreamer::new(Arc::clone(&loopback), &StreamArgs::new("fc32", "sc8")).unwrap();
        assert_eq!(rx.max_num_samps(), 4000);
        let rx = SimRxStreamer::new(loopback, &StreamArgs::default()).unwrap();
        assert_eq!(rx.max_num_samps(), 2000);
    }
}
