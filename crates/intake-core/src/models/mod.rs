//! Data models shared by the intake pipeline.

pub mod config;
pub mod inventory;
pub mod invoice;
pub mod report;
