//! Remote device access: sessions, filesystem helpers and command sequencing
//!
//! Everything in here talks to exactly one device through the traits in
//! [`session`]. The SSH implementation lives in [`ssh`]; tests substitute an
//! in-memory device.

pub mod fs;
pub mod sequencer;
pub mod session;
pub mod ssh;

pub use session::{CommandSession, ConnectionSpec, SessionFactory, TransferSession};
