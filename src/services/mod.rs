//! 业务服务层

pub mod launch;
pub mod readiness;
