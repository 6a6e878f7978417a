//! Swap agent: serves swap and paging statistics over HTTP

pub mod api;
pub mod config;
