//! 容器后端适配器
//!
//! `ContainerRuntime` 是对容器运行时的最小多态接口，
//! `CliBackend` 通过 podman/docker 可执行文件实现它。
//! 同名容器的 run/start 不做内部加锁，调用方需串行（启动序列天然满足）。

use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::container::ContainerSpec;
use crate::error::{LaunchError, LaunchResult};

/// 支持的后端
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Podman,
    Docker,
}

impl BackendKind {
    pub fn program(&self) -> &'static str {
        match self {
            BackendKind::Podman => "podman",
            BackendKind::Docker => "docker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "podman" => Some(BackendKind::Podman),
            "docker" => Some(BackendKind::Docker),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

/// 容器运行时接口
///
/// 生产实现为 `CliBackend`；测试里用内存假实现驱动启动序列与轮询。
/// 只做泛型单态使用，不经 dyn 分发，也不跨任务移动。
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    async fn container_exists(&self, name: &str) -> bool;
    async fn network_exists(&self, name: &str) -> bool;
    async fn create_network(&self, name: &str) -> LaunchResult<()>;
    /// 替换语义：同名容器已存在时先移除再创建，名字冲突不致命
    async fn run(&self, spec: &ContainerSpec) -> LaunchResult<()>;
    /// 停止容器；容器不存在/已停止视为成功
    async fn stop(&self, name: &str) -> LaunchResult<()>;
    /// 返回指定 Unix 时间戳之后的日志（stdout 与 stderr 合并）
    async fn logs_since(&self, name: &str, since_unix: i64) -> LaunchResult<String>;
    /// 在容器内执行命令
    async fn exec(&self, name: &str, argv: &[String]) -> LaunchResult<()>;
    async fn pull(&self, image: &str) -> LaunchResult<()>;
}

/// 拼装 run 命令参数；--replace 仅 podman 支持，docker 由调用处先 rm -f
pub fn run_args(kind: BackendKind, spec: &ContainerSpec) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".into(), "--rm".into(), "--detach".into()];
    if kind == BackendKind::Podman {
        args.push("--replace".into());
    }
    args.extend([
        "--network".into(),
        spec.network.clone(),
        "--network-alias".into(),
        spec.network_alias.clone(),
        "--name".into(),
        spec.name.clone(),
    ]);
    for vol in &spec.volumes {
        args.push("--volume".into());
        args.push(format!("{}:{}", vol.host.display(), vol.container));
    }
    for port in &spec.ports {
        args.push("--publish".into());
        args.push(port.publish_arg());
    }
    for env in &spec.env {
        args.push("-e".into());
        args.push(format!("{}={}", env.key, env.value));
    }
    args.push(spec.image.clone());
    args
}

/// podman/docker 命令行后端
pub struct CliBackend {
    kind: BackendKind,
}

impl CliBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    /// 自动探测可用后端，优先 podman
    pub async fn detect() -> LaunchResult<Self> {
        for kind in [BackendKind::Podman, BackendKind::Docker] {
            let probe = Command::new(kind.program())
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if probe.map(|s| s.success()).unwrap_or(false) {
                info!(backend = %kind, "Detected container backend");
                return Ok(Self::new(kind));
            }
        }
        Err(LaunchError::BackendUnavailable(
            "neither podman nor docker found in PATH".to_string(),
        ))
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    fn program(&self) -> &'static str {
        self.kind.program()
    }

    /// 执行后端命令并捕获输出
    async fn output(&self, args: &[&str]) -> LaunchResult<std::process::Output> {
        debug!(command = %format!("{} {}", self.program(), args.join(" ")), "Running backend command");
        Command::new(self.program())
            .args(args)
            .output()
            .await
            .map_err(|e| LaunchError::Spawn {
                program: self.program().to_string(),
                source: e,
            })
    }

    /// 执行后端命令，非零退出码转为错误
    async fn checked(&self, action: &str, args: &[&str]) -> LaunchResult<std::process::Output> {
        let output = self.output(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(LaunchError::CommandFailed {
                action: format!("{} {}", self.program(), action),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }

    /// 附着到容器输出流，阻塞直到流关闭或取消
    pub async fn attach(&self, name: &str, cancel: &CancellationToken) -> LaunchResult<Option<i32>> {
        debug!(container = %name, "Attaching to container");
        let child = Command::new(self.program())
            .args(["attach", "--no-stdin", name])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                program: self.program().to_string(),
                source: e,
            })?;
        wait_or_kill(child, cancel).await
    }
}

/// 等子进程退出；取消时杀掉并收割，不留游离的 attach 进程
async fn wait_or_kill(mut child: Child, cancel: &CancellationToken) -> LaunchResult<Option<i32>> {
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            Ok(None)
        }
        status = child.wait() => Ok(status.map_err(LaunchError::Io)?.code()),
    }
}

impl ContainerRuntime for CliBackend {
    async fn container_exists(&self, name: &str) -> bool {
        // podman 有专门的 exists 子命令，docker 用 inspect 的退出码代替
        let args: &[&str] = match self.kind {
            BackendKind::Podman => &["container", "exists", name],
            BackendKind::Docker => &["container", "inspect", name],
        };
        self.output(args)
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn network_exists(&self, name: &str) -> bool {
        let args: &[&str] = match self.kind {
            BackendKind::Podman => &["network", "exists", name],
            BackendKind::Docker => &["network", "inspect", name],
        };
        self.output(args)
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn create_network(&self, name: &str) -> LaunchResult<()> {
        self.checked("network create", &["network", "create", name])
            .await?;
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> LaunchResult<()> {
        debug!(
            spec = %serde_json::to_string(spec).unwrap_or_default(),
            "Container spec"
        );
        if self.kind == BackendKind::Docker {
            // docker 没有 --replace，先移除同名容器，失败忽略
            let _ = self.output(&["rm", "-f", &spec.name]).await;
        }
        let args = run_args(self.kind, spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.checked("run", &arg_refs).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> LaunchResult<()> {
        // 停止失败（容器不存在、已停止）按成功处理，清理必须尽力而为
        let _ = self.output(&["stop", name]).await;
        Ok(())
    }

    async fn logs_since(&self, name: &str, since_unix: i64) -> LaunchResult<String> {
        let since = since_unix.to_string();
        let output = self
            .checked("logs", &["logs", "--since", &since, name])
            .await?;
        // 容器日志可能同时出现在 stdout 和 stderr
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }

    async fn exec(&self, name: &str, argv: &[String]) -> LaunchResult<()> {
        let mut args: Vec<&str> = vec!["exec", name];
        args.extend(argv.iter().map(String::as_str));
        self.checked("exec", &args).await?;
        Ok(())
    }

    async fn pull(&self, image: &str) -> LaunchResult<()> {
        info!(image = %image, "Pulling image");
        self.checked("pull", &["pull", image]).await?;
        Ok(())
    }
}
