//! Built-in toolsets that ship with the dispatcher.

pub mod network;
