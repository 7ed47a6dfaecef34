pub mod device_factory;
pub mod device_session;
pub mod streamer;
