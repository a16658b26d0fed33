//! Ports: interfaces the application layer expects adapters to implement

pub mod backend;
