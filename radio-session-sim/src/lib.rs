//! # radio-session-sim
//!
//! Simulated device backend (`type=test`) for radio-session.
//!
//! Devices keep all frontend and motherboard state in memory and loop TX
//! samples back to RX on the same channel, so the full handle lifecycle
//! can be exercised without hardware.
//!
//! ```text
//! radio-session-sim (this crate)
//! ├── args          ← SimConfig, SimArgsError (device-args parsing)
//! ├── factory       ← SimFactory (find/make)
//! ├── sim_device    ← SimDevice (DeviceSession)
//! ├── gain_stages   ← GainStages (overall and per-stage gain)
//! ├── sim_streamer  ← Loopback, SimRxStreamer, SimTxStreamer
//! └── ring_buffer   ← RingBuffer (loopback FIFO)
//! ```

pub mod args;
pub mod factory;
pub mod gain_stages;
pub mod ring_buffer;
pub mod sim_device;
pub mod sim_streamer;

pub use args::{SimArgsError, SimConfig, SIM_DEVICE_TYPE};
pub use factory::SimFactory;
pub use sim_device::{FrontendFlags, SimDevice};
pub use sim_streamer::{Loopback, SimRxStreamer, SimTxStreamer};
