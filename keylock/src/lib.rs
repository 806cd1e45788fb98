//! Access-control keypad: code entry on an SX1509-driven 4x3 keypad, validation, and the unlock
//! cycle around it.

pub mod config;
pub mod orchestrator;
pub mod remote;
pub mod validator;
