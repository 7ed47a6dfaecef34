pub mod config;
pub mod error;
pub mod info;
pub mod metadata;
pub mod range;
pub mod sensor;
pub mod slot;
pub mod stream;
pub mod time;
pub mod tune;
