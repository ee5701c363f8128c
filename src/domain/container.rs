//! 容器相关领域模型
//!
//! `ContainerSpec` 是纯数据描述，不接触容器运行时；
//! 实际命令行由 infra::backend 按后端拼装。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 环境变量键值对（保持插入顺序，便于命令行可复现）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// 卷挂载：宿主机目录 -> 容器内路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host: PathBuf,
    pub container: String,
}

/// 端口发布；始终绑定 127.0.0.1，从不暴露到所有接口
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_port: u16,
    pub container_port: u16,
}

impl PortBinding {
    /// podman/docker --publish 参数形式
    pub fn publish_arg(&self) -> String {
        format!("127.0.0.1:{}:{}", self.host_port, self.container_port)
    }
}

/// 容器描述符
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: String,
    pub network_alias: String,
    pub env: Vec<EnvVar>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortBinding>,
}

impl ContainerSpec {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        network: impl Into<String>,
        network_alias: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            network: network.into(),
            network_alias: network_alias.into(),
            env: Vec::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn volume(mut self, host: PathBuf, container: impl Into<String>) -> Self {
        self.volumes.push(VolumeMount {
            host,
            container: container.into(),
        });
        self
    }

    /// 在 127.0.0.1 上发布端口
    pub fn publish_loopback(mut self, host_port: u16, container_port: u16) -> Self {
        self.ports.push(PortBinding {
            host_port,
            container_port,
        });
        self
    }
}

/// 就绪探测：日志子串匹配
///
/// 下游镜像没有可用的健康检查端点，只能依赖日志输出。
/// 这些子串是与镜像的外部契约，跨版本保持不变，不要改动。
#[derive(Debug, Clone, Copy)]
pub struct ReadinessProbe {
    /// 出现即视为就绪
    pub ready_pattern: &'static str,
    /// 任一出现即视为启动失败
    pub error_patterns: &'static [&'static str],
}

/// Neo4j 就绪探测
pub const NEO4J_PROBE: ReadinessProbe = ReadinessProbe {
    ready_pattern: "Remote interface available at http://localhost:7474/",
    error_patterns: &["Error"],
};

/// BloodHound 应用就绪探测
pub const BLOODHOUND_PROBE: ReadinessProbe = ReadinessProbe {
    ready_pattern: "Server started successfully",
    error_patterns: &["\"level\":\"error\"", "\"level\":\"fatal\"", "Error: "],
};

/// PostgreSQL 探测（启动足够快，序列中不轮询，仅供诊断输出使用）
pub const POSTGRES_PROBE: ReadinessProbe = ReadinessProbe {
    ready_pattern: "database system is ready to accept connections",
    error_patterns: &["FATAL:", "ERROR:", "could not"],
};
