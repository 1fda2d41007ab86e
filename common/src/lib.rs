pub mod app;
pub mod clock;
pub mod error;
pub mod gfx;
pub mod gui;
pub mod input;
#[cfg(windows)]
pub mod os;
pub mod util;

pub use error::{Error, Result};
