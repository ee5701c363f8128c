//! 配置模块
//!
//! 配置在启动时构造一次（命令行 > 环境变量 > 默认值），
//! 之后以引用传递，组件内部不做任何环境变量查询

pub mod env;
pub mod workspace;

pub use env::LaunchConfig;
pub use workspace::Workspace;
