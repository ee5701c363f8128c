//! houndctl - 单用户 BloodHound CE 容器启动器
//!
//! 库入口，按领域分层组织模块

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
