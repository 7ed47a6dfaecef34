pub mod device_handle;
pub mod last_error;
pub mod streamer_handle;
