//! HTTP access to the online gallery

pub mod client;
pub mod gallery;
