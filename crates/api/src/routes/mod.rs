//! API Routes

pub mod control;
pub mod frame;
pub mod status;
