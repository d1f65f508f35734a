#![doc = include_str!("../README.md")]

pub mod api;
pub mod clock;
pub mod coordinator;
pub mod core;
pub mod prelude;
pub mod retry;
