//! HTTP handlers for content-service.

pub mod ai;
pub mod campaigns;
pub mod categories;
pub mod health;
pub mod newsletters;
pub mod posts;
pub mod social;
pub mod subscribers;
pub mod tags;
