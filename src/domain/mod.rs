//! 领域模型

pub mod container;
