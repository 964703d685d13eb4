//! Deployment workflows and the device facts they rely on

pub mod device;
pub mod executor;
pub mod fsm;
pub mod scripts;
pub mod workflows;

pub use workflows::Orchestrator;
