//! Magicstomp Editor Library
//!
//! Core library for editing Yamaha Magicstomp patches over MIDI SysEx.

pub mod config;
pub mod engine;
pub mod patch;
pub mod persistence;
pub mod sysex;
