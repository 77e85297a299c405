//! Shared Frame/Status Store
//!
//! Holds the most recently processed frame and driver status. One writer
//! (the capture loop) publishes; any number of readers copy values out.

mod store;

pub use store::FrameStore;
