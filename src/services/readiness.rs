//! 日志轮询就绪检测
//!
//! 下游镜像没有健康检查端点，唯一可靠的信号是日志输出。
//! 每个 tick 重新拉取会话时间戳之后的完整日志，在其中找
//! 就绪子串或错误子串。默认不设轮询上限，数据库冷启动
//! （首次建库、大数据集恢复）可能要几分钟。

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::env::constants;
use crate::domain::container::ReadinessProbe;
use crate::error::{LaunchError, LaunchResult};
use crate::infra::backend::ContainerRuntime;

/// 就绪轮询器
#[derive(Clone, Debug)]
pub struct Poller {
    /// 两次日志拉取之间的间隔
    pub interval: Duration,
    /// 轮询次数上限；None 表示一直等
    pub max_polls: Option<u32>,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(constants::POLL_INTERVAL_SECS),
            max_polls: None,
        }
    }
}

impl Poller {
    /// 等待容器就绪，返回实际轮询次数
    ///
    /// 状态机：每个 tick 先睡、再取日志。
    /// 命中就绪子串 -> Ok；命中错误子串 -> ContainerFailed（携带日志）；
    /// 日志拉取失败且容器已不在 -> ContainerVanished。
    pub async fn wait_for_ready<R: ContainerRuntime>(
        &self,
        runtime: &R,
        container: &str,
        probe: &ReadinessProbe,
        since_unix: i64,
        cancel: &CancellationToken,
    ) -> LaunchResult<u32> {
        let mut polls: u32 = 0;
        loop {
            if let Some(max) = self.max_polls {
                if polls >= max {
                    return Err(LaunchError::ReadinessTimeout {
                        container: container.to_string(),
                        polls,
                    });
                }
            }

            // 先睡再查：容器刚 run 完，第一条日志也要等一会儿
            tokio::select! {
                _ = cancel.cancelled() => return Err(LaunchError::Interrupted),
                _ = tokio::time::sleep(self.interval) => {}
            }
            polls += 1;

            let logs = match runtime.logs_since(container, since_unix).await {
                Ok(logs) => logs,
                Err(err) => {
                    if !runtime.container_exists(container).await {
                        warn!(container = %container, "Container disappeared during readiness wait");
                        return Err(LaunchError::ContainerVanished {
                            container: container.to_string(),
                        });
                    }
                    return Err(err);
                }
            };

            if logs.contains(probe.ready_pattern) {
                info!(container = %container, polls, "Container ready");
                return Ok(polls);
            }

            if let Some(pattern) = probe
                .error_patterns
                .iter()
                .find(|p| logs.contains(**p))
            {
                warn!(container = %container, pattern = %pattern, "Error pattern in container logs");
                return Err(LaunchError::ContainerFailed {
                    container: container.to_string(),
                    logs,
                });
            }

            // 没有任何信号也要确认容器还活着（干净退出不会留错误日志）
            if !runtime.container_exists(container).await {
                return Err(LaunchError::ContainerVanished {
                    container: container.to_string(),
                });
            }

            debug!(container = %container, polls, "Not ready yet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::container::ContainerSpec;
    use std::sync::Mutex;

    /// 按轮次返回预置日志快照的假运行时
    struct ScriptedRuntime {
        snapshots: Mutex<Vec<LaunchResult<String>>>,
        exists: Mutex<bool>,
        since_seen: Mutex<Vec<i64>>,
    }

    impl ScriptedRuntime {
        fn new(snapshots: Vec<LaunchResult<String>>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots),
                exists: Mutex::new(true),
                since_seen: Mutex::new(Vec::new()),
            }
        }

        fn gone(self) -> Self {
            *self.exists.lock().unwrap() = false;
            self
        }
    }

    impl ContainerRuntime for ScriptedRuntime {
        async fn container_exists(&self, _name: &str) -> bool {
            *self.exists.lock().unwrap()
        }
        async fn network_exists(&self, _name: &str) -> bool {
            true
        }
        async fn create_network(&self, _name: &str) -> LaunchResult<()> {
            Ok(())
        }
        async fn run(&self, _spec: &ContainerSpec) -> LaunchResult<()> {
            Ok(())
        }
        async fn stop(&self, _name: &str) -> LaunchResult<()> {
            Ok(())
        }
        async fn logs_since(&self, _name: &str, since: i64) -> LaunchResult<String> {
            self.since_seen.lock().unwrap().push(since);
            let mut snapshots = self.snapshots.lock().unwrap();
            if snapshots.is_empty() {
                Ok(String::new())
            } else {
                snapshots.remove(0)
            }
        }
        async fn exec(&self, _name: &str, _argv: &[String]) -> LaunchResult<()> {
            Ok(())
        }
        async fn pull(&self, _image: &str) -> LaunchResult<()> {
            Ok(())
        }
    }

    fn fast_poller(max_polls: Option<u32>) -> Poller {
        Poller {
            interval: Duration::from_millis(1),
            max_polls,
        }
    }

    const PROBE: ReadinessProbe = ReadinessProbe {
        ready_pattern: "ready to serve",
        error_patterns: &["boom"],
    };

    #[tokio::test]
    async fn test_ready_on_later_poll_counts_polls() {
        let runtime = ScriptedRuntime::new(vec![
            Ok("starting".to_string()),
            Ok("starting\nwarming up".to_string()),
            Ok("starting\nwarming up\nready to serve".to_string()),
        ]);
        let polls = fast_poller(None)
            .wait_for_ready(&runtime, "c", &PROBE, 0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn test_every_poll_requests_logs_from_session_start() {
        // 会话起点之前的日志由后端过滤，轮询器要原样透传时间戳
        let runtime = ScriptedRuntime::new(vec![
            Ok(String::new()),
            Ok("ready to serve".to_string()),
        ]);
        fast_poller(None)
            .wait_for_ready(&runtime, "c", &PROBE, 1_756_250_000, &CancellationToken::new())
            .await
            .unwrap();
        let seen = runtime.since_seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[1_756_250_000, 1_756_250_000]);
    }

    #[tokio::test]
    async fn test_error_pattern_fails_with_logs() {
        let runtime = ScriptedRuntime::new(vec![Ok("starting\nboom: disk full".to_string())]);
        let err = fast_poller(None)
            .wait_for_ready(&runtime, "c", &PROBE, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            LaunchError::ContainerFailed { container, logs } => {
                assert_eq!(container, "c");
                assert!(logs.contains("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ready_wins_even_if_error_also_present() {
        // 就绪优先于错误：同一快照里两者都有时算就绪
        let runtime =
            ScriptedRuntime::new(vec![Ok("boom earlier\nrecovered\nready to serve".to_string())]);
        let polls = fast_poller(None)
            .wait_for_ready(&runtime, "c", &PROBE, 0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(polls, 1);
    }

    #[tokio::test]
    async fn test_vanished_container_detected() {
        let runtime = ScriptedRuntime::new(vec![Err(LaunchError::CommandFailed {
            action: "podman logs".to_string(),
            code: Some(125),
            stderr: "no such container".to_string(),
        })])
        .gone();
        let err = fast_poller(None)
            .wait_for_ready(&runtime, "c", &PROBE, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::ContainerVanished { .. }));
    }

    #[tokio::test]
    async fn test_max_polls_times_out() {
        let runtime = ScriptedRuntime::new(vec![]);
        let err = fast_poller(Some(3))
            .wait_for_ready(&runtime, "c", &PROBE, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            LaunchError::ReadinessTimeout { polls, .. } => assert_eq!(polls, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let runtime = ScriptedRuntime::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fast_poller(None)
            .wait_for_ready(&runtime, "c", &PROBE, 0, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Interrupted));
    }
}
