//! Status-cache change fan-out.

mod broadcaster;

pub use broadcaster::{StatusBroadcaster, status_update};
