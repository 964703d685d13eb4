//! Local settings and storage layout

pub mod layout;
pub mod settings;
