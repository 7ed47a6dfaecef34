//! Flattening of results for callers that only have fixed-size buffers.

pub mod buffer;
pub mod string_list;

pub use buffer::{copy_str_to_buffer, truncate_on_char_boundary};
pub use string_list::{join_list, join_list_with, LIST_DELIMITER};
