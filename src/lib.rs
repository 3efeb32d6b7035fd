//! Core of the UartAssistant serial terminal: serial worker, periodic timers,
//! settings, receive scrollback, shortcuts and the controller tying them
//! together. The iced front end in `main.rs` only renders this state.

pub mod connection;
pub mod controller;
pub mod error;
pub mod event;
pub mod file;
pub mod hex;
pub mod packet;
pub mod scrollback;
pub mod serial;
pub mod settings;
pub mod shortcuts;
pub mod theme;
pub mod timer;

pub use controller::Controller;
pub use error::{Error, Result};
