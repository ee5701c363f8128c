//! 启动配置加载
//!
//! 优先级：命令行参数 > 环境变量 > 默认值。
//! 所有覆盖项在这里折叠进一个 `LaunchConfig`，其余模块只读该结构体。

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::error::{LaunchError, LaunchResult};
use crate::infra::backend::BackendKind;

/// 命令行解析结果（见 main.rs 的 parse_args）
#[derive(Clone, Debug, Default)]
pub struct CliArgs {
    pub backend: Option<String>,
    pub port: Option<u16>,
    pub workspace: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub bolt_port: Option<u16>,
    pub debug: bool,
    pub command: CliCommand,
}

/// 子命令
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CliCommand {
    /// 启动完整栈并保持附着（默认）
    #[default]
    Run,
    /// 只拉取三个镜像后退出
    Pull,
}

/// 启动配置
#[derive(Clone, Debug)]
pub struct LaunchConfig {
    /// 容器后端；None 表示自动探测（优先 podman）
    pub backend: Option<BackendKind>,
    /// BloodHound Web 端口（仅绑定 127.0.0.1）
    pub port: u16,
    /// Neo4j bolt 端口；仅在显式指定时发布
    pub bolt_port: Option<u16>,
    /// 工作区名称，决定数据目录与容器命名
    pub workspace: String,
    /// 显式数据目录覆盖（绕过 XDG 解析）
    pub data_dir: Option<PathBuf>,
    /// 管理员账号
    pub admin_name: String,
    pub admin_password: String,
    /// 镜像引用
    pub bloodhound_image: String,
    pub neo4j_image: String,
    pub postgres_image: String,
    /// 透传给应用容器的 bhe_disable_cypher_qc
    pub disable_cypher_qc: String,
    /// 调试模式：提升日志级别并回显后端命令行
    pub debug: bool,
}

impl LaunchConfig {
    /// 从命令行参数和环境变量构造配置
    pub fn from_cli(args: &CliArgs) -> LaunchResult<Self> {
        let backend_name = args.backend.clone().or_else(|| env::var("BACKEND").ok());
        let backend = match backend_name.as_deref() {
            Some(name) => Some(BackendKind::from_name(name).ok_or_else(|| {
                LaunchError::InvalidConfig(format!(
                    "unknown backend '{}', expected 'podman' or 'docker'",
                    name
                ))
            })?),
            None => None,
        };

        let port = match args.port {
            Some(p) => p,
            None => env_parsed("PORT").unwrap_or(constants::DEFAULT_PORT),
        };
        validate_port(port, "port")?;

        let bolt_port = args.bolt_port;
        if let Some(bolt) = bolt_port {
            validate_port(bolt, "bolt-port")?;
            if bolt == port {
                return Err(LaunchError::InvalidConfig(format!(
                    "bolt-port ({}) cannot be the same as port ({})",
                    bolt, port
                )));
            }
        }

        let workspace = args
            .workspace
            .clone()
            .or_else(|| env::var("WORKSPACE").ok())
            .unwrap_or_else(|| constants::DEFAULT_WORKSPACE.to_string());
        validate_workspace(&workspace)?;

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| env::var("DATA_DIR").ok().map(PathBuf::from));
        if let Some(dir) = &data_dir {
            validate_data_dir(dir)?;
        }

        let tag = env::var("BLOODHOUND_TAG").unwrap_or_else(|_| "latest".to_string());
        let bloodhound_image = format!("{}:{}", constants::BLOODHOUND_IMAGE_BASE, tag);

        let admin_name =
            env::var("ADMIN_NAME").unwrap_or_else(|_| constants::DEFAULT_ADMIN_NAME.to_string());
        let admin_password = env::var("ADMIN_PASSWORD")
            .unwrap_or_else(|_| constants::DEFAULT_ADMIN_PASSWORD.to_string());

        let disable_cypher_qc =
            env::var("bhe_disable_cypher_qc").unwrap_or_else(|_| "false".to_string());

        Ok(Self {
            backend,
            port,
            bolt_port,
            workspace,
            data_dir,
            admin_name,
            admin_password,
            bloodhound_image,
            neo4j_image: constants::NEO4J_IMAGE.to_string(),
            postgres_image: constants::POSTGRES_IMAGE.to_string(),
            disable_cypher_qc,
            debug: args.debug,
        })
    }
}

/// 端口校验；u16 已保证上界，这里拦截 0 并对特权端口给出提示
fn validate_port(port: u16, label: &str) -> LaunchResult<()> {
    if port == 0 {
        return Err(LaunchError::InvalidConfig(format!(
            "{} must be between 1 and 65535",
            label
        )));
    }
    if port < 1024 {
        warn!(
            "{} ({}) is a privileged port, you may need elevated privileges",
            label, port
        );
    }
    Ok(())
}

/// 工作区名称只允许字母、数字、下划线和连字符
fn validate_workspace(workspace: &str) -> LaunchResult<()> {
    let ok = !workspace.is_empty()
        && workspace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(LaunchError::InvalidConfig(format!(
            "workspace '{}' contains invalid characters (use letters, digits, '_' or '-')",
            workspace
        )))
    }
}

/// 显式数据目录要么已存在，要么父目录存在且可写（默认的 XDG 路径会被自动创建）
fn validate_data_dir(dir: &std::path::Path) -> LaunchResult<()> {
    if dir.exists() {
        return Ok(());
    }
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    if !parent.exists() {
        return Err(LaunchError::InvalidConfig(format!(
            "parent directory {} does not exist, create it first: mkdir -p {}",
            parent.display(),
            parent.display()
        )));
    }
    if !dir_writable(parent) {
        return Err(LaunchError::InvalidConfig(format!(
            "no write permission for {}, check directory permissions",
            parent.display()
        )));
    }
    Ok(())
}

/// 写权限探测：实际落一个临时文件再删掉，比读权限位可靠
fn dir_writable(dir: &std::path::Path) -> bool {
    let probe = dir.join(format!(".houndctl-w-{}", std::process::id()));
    match std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&probe)
    {
        Ok(file) => {
            drop(file);
            let _ = std::fs::remove_file(&probe);
            true
        }
        // 上一次探测残留的同名文件说明目录本身可写
        Err(e) => e.kind() == std::io::ErrorKind::AlreadyExists,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// 常量
pub mod constants {
    /// 默认 Web 端口
    pub const DEFAULT_PORT: u16 = 8181;

    /// 默认工作区
    pub const DEFAULT_WORKSPACE: &str = "default";

    /// 默认管理员账号
    pub const DEFAULT_ADMIN_NAME: &str = "admin";
    pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

    /// 镜像引用
    pub const BLOODHOUND_IMAGE_BASE: &str = "docker.io/specterops/bloodhound";
    pub const NEO4J_IMAGE: &str = "docker.io/library/neo4j:4.4";
    pub const POSTGRES_IMAGE: &str = "docker.io/library/postgres:16";

    /// 后端数据库固定凭据（与镜像约定一致）
    pub const DB_USER: &str = "bloodhound";
    pub const DB_PASSWORD: &str = "bloodhoundcommunityedition";
    pub const DB_NAME: &str = "bloodhound";
    pub const NEO4J_USER: &str = "neo4j";
    pub const NEO4J_PASSWORD: &str = "bloodhoundcommunityedition";

    /// 数据目录下的产品子目录
    pub const PRODUCT_DIR: &str = "houndctl";

    /// 就绪轮询间隔（秒）
    pub const POLL_INTERVAL_SECS: u64 = 1;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
