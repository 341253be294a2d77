pub mod async_helper;
pub use async_helper::*;

pub mod channel;
pub use channel::{channel, Receiver, Sender};

pub mod coord_utils;
pub use coord_utils::*;

pub mod frame_clock;
pub use frame_clock::*;

pub mod hash;
pub use hash::*;

pub mod logging;
pub use logging::*;

pub mod matrix;
pub use matrix::*;
