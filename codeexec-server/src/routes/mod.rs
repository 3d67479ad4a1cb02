//! HTTP routes

pub mod execute;
pub mod health;
pub mod languages;
