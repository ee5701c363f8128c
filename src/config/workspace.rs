//! 工作区解析
//!
//! 一个工作区 = 一对持久卷 + 一组容器名 + 一个私有网络。
//! 不同工作区的所有派生名称互不相交，因此不同工作区可以并行运行。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::env::{constants, LaunchConfig};
use crate::error::{LaunchError, LaunchResult};

/// 数据盘最低剩余空间，三个镜像加初始数据大致就要这么多
const MIN_FREE_GB: f64 = 2.0;

/// 已解析的工作区
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    /// 工作区数据目录
    pub data_dir: PathBuf,
    /// Neo4j 卷目录（挂载到 /data）
    pub neo4j_vol: PathBuf,
    /// PostgreSQL 卷目录（挂载到 /var/lib/postgresql/data）
    pub postgres_vol: PathBuf,
}

impl Workspace {
    /// 从配置解析工作区路径
    ///
    /// 显式 data_dir 覆盖优先；否则遵循 XDG：
    /// `$XDG_DATA_HOME/houndctl/<workspace>`，回退 `~/.local/share`
    pub fn resolve(config: &LaunchConfig) -> Self {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => xdg_data_home()
                .join(constants::PRODUCT_DIR)
                .join(&config.workspace),
        };
        Self {
            name: config.workspace.clone(),
            neo4j_vol: data_dir.join("neo4j"),
            postgres_vol: data_dir.join("postgres"),
            data_dir,
        }
    }

    /// 创建卷目录（幂等；已有数据不受影响，目录从不自动删除）
    pub fn ensure_dirs(&self) -> LaunchResult<()> {
        check_disk_space(&self.data_dir)?;
        std::fs::create_dir_all(&self.neo4j_vol)?;
        std::fs::create_dir_all(&self.postgres_vol)?;
        Ok(())
    }

    /// 工作区私有网络名
    pub fn network(&self) -> String {
        format!("bloodhound-net-{}", self.name)
    }

    /// 应用容器名
    pub fn app_container(&self) -> String {
        format!("bloodhound-app-{}", self.name)
    }

    /// 图数据库容器名
    pub fn graph_container(&self) -> String {
        format!("bloodhound-graph-{}", self.name)
    }

    /// 关系数据库容器名
    pub fn pg_container(&self) -> String {
        format!("bloodhound-pg-{}", self.name)
    }
}

/// 拒绝在快满的盘上启动；查不到挂载点时只告警继续（容器里常见）
fn check_disk_space(path: &Path) -> LaunchResult<()> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let disk = disks
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len());
    match disk {
        Some(disk) if !free_space_ok(disk.available_space(), MIN_FREE_GB) => {
            Err(LaunchError::InvalidConfig(format!(
                "insufficient disk space at {}: need {:.1}GB free, have {:.1}GB",
                disk.mount_point().display(),
                MIN_FREE_GB,
                disk.available_space() as f64 / 1024.0 / 1024.0 / 1024.0
            )))
        }
        Some(_) => Ok(()),
        None => {
            warn!(path = %path.display(), "Cannot determine free disk space");
            Ok(())
        }
    }
}

fn free_space_ok(free_bytes: u64, min_gb: f64) -> bool {
    free_bytes as f64 / 1024.0 / 1024.0 / 1024.0 >= min_gb
}

fn xdg_data_home() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local").join("share")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::CliArgs;

    fn workspace_named(name: &str) -> Workspace {
        let args = CliArgs {
            workspace: Some(name.to_string()),
            ..CliArgs::default()
        };
        let config = LaunchConfig::from_cli(&args).unwrap();
        Workspace::resolve(&config)
    }

    #[test]
    fn test_distinct_workspaces_are_disjoint() {
        let w1 = workspace_named("alpha");
        let w2 = workspace_named("beta");

        assert_ne!(w1.data_dir, w2.data_dir);
        assert_ne!(w1.neo4j_vol, w2.neo4j_vol);
        assert_ne!(w1.postgres_vol, w2.postgres_vol);
        assert_ne!(w1.network(), w2.network());
        assert_ne!(w1.app_container(), w2.app_container());
        assert_ne!(w1.graph_container(), w2.graph_container());
        assert_ne!(w1.pg_container(), w2.pg_container());
    }

    #[test]
    fn test_volume_layout_under_workspace_dir() {
        let w = workspace_named("layout");
        assert_eq!(w.neo4j_vol, w.data_dir.join("neo4j"));
        assert_eq!(w.postgres_vol, w.data_dir.join("postgres"));
        assert!(w
            .data_dir
            .to_string_lossy()
            .contains(constants::PRODUCT_DIR));
    }

    #[test]
    fn test_free_space_threshold() {
        let gib = 1024 * 1024 * 1024;
        assert!(!free_space_ok(gib, 2.0));
        assert!(free_space_ok(3 * gib, 2.0));
        assert!(free_space_ok(2 * gib, 2.0));
    }

    #[test]
    fn test_ensure_dirs_creates_volume_layout() {
        let base = std::env::temp_dir().join("houndctl-ensure-dirs-test");
        let args = CliArgs {
            workspace: Some("mkdirs".to_string()),
            data_dir: Some(base.clone()),
            ..CliArgs::default()
        };
        let config = LaunchConfig::from_cli(&args).unwrap();
        let w = Workspace::resolve(&config);
        w.ensure_dirs().unwrap();
        assert!(w.neo4j_vol.is_dir());
        assert!(w.postgres_vol.is_dir());
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn test_explicit_data_dir_override() {
        let args = CliArgs {
            workspace: Some("pinned".to_string()),
            data_dir: Some(PathBuf::from("/tmp/bh-data")),
            ..CliArgs::default()
        };
        let config = LaunchConfig::from_cli(&args).unwrap();
        let w = Workspace::resolve(&config);
        assert_eq!(w.data_dir, PathBuf::from("/tmp/bh-data"));
        assert_eq!(w.neo4j_vol, PathBuf::from("/tmp/bh-data/neo4j"));
    }
}
