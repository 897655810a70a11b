//! Text reconstruction: chunk merging, markup cleanup, redirect resolution.

pub mod merge;
pub mod redirect;
pub mod sanitize;

pub use merge::{find_overlap, merge_chunks, representative_window, Chunk};
pub use redirect::{is_redirect, redirect_target, RedirectResolver};
pub use sanitize::Sanitizer;
