//! 统一错误处理
//!
//! 提供 `LaunchError` 枚举，替代散落各处的 `(String, i32)` 错误模式

/// 启动器统一错误类型
#[derive(Debug)]
pub enum LaunchError {
    /// 无法启动后端进程（podman/docker 不存在或无执行权限）
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// 后端命令返回非零退出码
    CommandFailed {
        action: String,
        code: Option<i32>,
        stderr: String,
    },
    /// 找不到可用的容器后端
    BackendUnavailable(String),
    /// 容器日志中出现错误模式
    ContainerFailed { container: String, logs: String },
    /// 轮询期间容器消失
    ContainerVanished { container: String },
    /// 就绪轮询超出调用方设置的上限
    ReadinessTimeout { container: String, polls: u32 },
    /// 配置无效
    InvalidConfig(String),
    /// IO 错误（目录创建等）
    Io(std::io::Error),
    /// 收到中断信号
    Interrupted,
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Spawn { program, source } => {
                write!(f, "Failed to spawn {}: {}", program, source)
            }
            LaunchError::CommandFailed {
                action,
                code,
                stderr,
            } => {
                write!(
                    f,
                    "{} failed with exit code {:?}: {}",
                    action,
                    code,
                    stderr.trim()
                )
            }
            LaunchError::BackendUnavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            LaunchError::ContainerFailed { container, .. } => {
                write!(f, "{} container failed", container)
            }
            LaunchError::ContainerVanished { container } => {
                write!(f, "{} container disappeared during startup", container)
            }
            LaunchError::ReadinessTimeout { container, polls } => {
                write!(f, "{} not ready after {} polls", container, polls)
            }
            LaunchError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            LaunchError::Io(e) => write!(f, "IO error: {}", e),
            LaunchError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Spawn { source, .. } => Some(source),
            LaunchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LaunchError {
    fn from(e: std::io::Error) -> Self {
        LaunchError::Io(e)
    }
}

/// 便捷类型别名
pub type LaunchResult<T> = Result<T, LaunchError>;
