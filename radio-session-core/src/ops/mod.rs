pub mod device_ops;
pub mod streamer_ops;
