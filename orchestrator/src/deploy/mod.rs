//! Deployment execution layer

pub mod approval;
pub mod drift;
pub mod executor;
pub mod hooks;
