//! C6: health monitors for the inline bridge (C6a) and upstream internet
//! reachability (C6b), sharing the bounded-history ring buffer.

pub mod bounded_history;
pub mod bridge;
pub mod internet;
