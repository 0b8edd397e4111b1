//! Clients for the portal's REST services

pub mod app_deployment;
pub mod device_info;
