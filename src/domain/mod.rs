//! Domain layer
//!
//! Entities shared by every walker and the services that pick a walker
//! for a candidate offset.

pub mod entities;
pub mod services;
