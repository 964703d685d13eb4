//! rmsleep library
//!
//! Core modules for managing the sleep screen of a reMarkable tablet over SSH.

pub mod app;
pub mod assets;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod imaging;
pub mod logs;
pub mod models;
pub mod remote;
pub mod storage;
pub mod utils;
