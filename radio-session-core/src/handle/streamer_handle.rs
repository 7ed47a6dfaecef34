use std::fmt;

use crate::handle::last_error::LastError;
use crate::models::slot::{Direction, SlotIndex};

/// Location of a streamer: its parent device and its position in that
/// device's RX or TX list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamLocation {
    pub device: SlotIndex,
    pub position: usize,
}

macro_rules! streamer_handle {
    ($(#[$meta:meta])* $name:ident, $dir:expr) => {
        $(#[$meta])*
        pub struct $name {
            location: StreamLocation,
            last_error: LastError,
        }

        impl $name {
            pub(crate) fn new(device: SlotIndex, position: usize) -> Self {
                Self {
                    location: StreamLocation { device, position },
                    last_error: LastError::new(),
                }
            }

            pub const DIRECTION: Direction = $dir;

            pub fn location(&self) -> StreamLocation {
                self.location
            }

            /// Slot index of the owning device.
            pub fn device_index(&self) -> SlotIndex {
                self.location.device
            }

            /// Position within the owning device's streamer list.
            pub fn position(&self) -> usize {
                self.location.position
            }

            pub fn last_error(&self) -> String {
                self.last_error.get()
            }

            pub fn last_error_into(&self, buffer: &mut [u8]) -> usize {
                self.last_error.copy_into(buffer)
            }

            pub(crate) fn error_slot(&self) -> &LastError {
                &self.last_error
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("device", &self.location.device)
                    .field("position", &self.location.position)
                    .finish()
            }
        }
    };
}

streamer_handle!(
    /// Caller-held token for a receive streamer.
    RxStreamerHandle,
    Direction::Rx
);

streamer_handle!(
    /// Caller-held token for a transmit streamer.
    TxStreamerHandle,
    Direction::Tx
);
