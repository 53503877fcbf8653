#![allow(dead_code)]

pub mod connection_tracker;
pub mod mock_server;
pub mod proxy;
pub mod stub;
pub mod tls;
