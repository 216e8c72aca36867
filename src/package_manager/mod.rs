//! 包管理器模块：对 pacman / AUR 助手的封装

pub mod details;
pub mod operation;
pub mod parser;
pub mod query;
pub mod search;
pub mod streaming;
pub mod types;
pub mod updates;

// 重新导出常用类型和函数
pub use operation::{execute, OperationEvent, OperationRequest};
pub use query::{ProcessRunner, QueryRunner};
pub use types::{Credential, PackageDetails, PackageRecord, RepoListing, Source, UpdateItem};

use crate::config::Config;
use crate::session::{is_root, Session};
use query::{Query, QueryOutput};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// sudo 口令校验的超时
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("another operation is already in progress, please wait")]
    OperationInProgress,
    #[error("authentication failed: incorrect password")]
    AuthenticationFailed,
    #[error("administrator privileges required, authenticate first")]
    CredentialRequired,
    #[error("{} is not a package file (.pkg.tar.zst or .pkg.tar.xz)", .0.display())]
    NotAPackageFile(std::path::PathBuf),
    #[error("failed to start worker thread: {0}")]
    Worker(#[from] std::io::Error),
}

/// 能否启动给定程序（不关心退出码）
fn program_available(program: &str) -> bool {
    duct::cmd(program, ["--version"])
        .stdin_null()
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
        .is_ok()
}

/// 启动时检查 pacman 是否在 PATH 中
pub fn pacman_available() -> bool {
    program_available("pacman")
}

/// 查询入口；每个异步请求克隆一份带进自己的任务
pub struct PackageManager<R = ProcessRunner> {
    runner: Arc<R>,
    config: Config,
    session: Arc<Session>,
}

impl<R> Clone for PackageManager<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            config: self.config.clone(),
            session: Arc::clone(&self.session),
        }
    }
}

impl PackageManager<ProcessRunner> {
    pub fn new(config: Config, session: Arc<Session>) -> Self {
        Self::with_runner(Arc::new(ProcessRunner), config, session)
    }
}

impl<R: QueryRunner> PackageManager<R> {
    pub fn with_runner(runner: Arc<R>, config: Config, session: Arc<Session>) -> Self {
        Self {
            runner,
            config,
            session,
        }
    }

    pub fn aur_helper(&self) -> &str {
        &self.config.aur_helper
    }

    /// 执行一次有界查询；启动失败和超时统一降级为 None
    async fn run_query(&self, query: Query) -> Option<QueryOutput> {
        let display = query.display();
        log::debug!("query: {}", display);
        match self.runner.run(query).await {
            Ok(output) => Some(output),
            Err(e) => {
                log::warn!("query degraded: {}", e);
                None
            }
        }
    }

    /// `pacman -Q <name>` 成功即视为已安装
    async fn is_installed(&self, name: &str) -> bool {
        let query = Query::new("pacman", ["-Q", name], self.config.point_query_timeout());
        self.run_query(query).await.map(|o| o.success()).unwrap_or(false)
    }

    /// 校验 sudo 口令，成功后在会话中保存
    ///
    /// root 运行时无需口令，直接通过。
    pub async fn authenticate(&self, credential: Credential) -> Result<(), EngineError> {
        if is_root() {
            return Ok(());
        }
        let query = Query::new("sudo", ["-S", "-p", "", "-k", "true"], AUTH_TIMEOUT)
            .with_stdin(credential.clone());
        match self.run_query(query).await {
            Some(out) if out.success() => {
                log::info!("sudo credential accepted");
                self.session.set_credential(credential);
                Ok(())
            }
            _ => {
                log::warn!("sudo credential rejected");
                Err(EngineError::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::query::fake::FakeRunner;

    #[test]
    fn program_check_detects_missing_programs() {
        assert!(program_available("sh"));
        assert!(!program_available("pkger-no-such-program"));
    }

    #[tokio::test]
    async fn rejected_password_is_not_stored() {
        if is_root() {
            return;
        }
        let runner = Arc::new(FakeRunner::new().reply("sudo -S -p  -k true", 1, ""));
        let session = Arc::new(Session::new(10));
        let pm = PackageManager::with_runner(Arc::clone(&runner), Config::default(), Arc::clone(&session));
        let err = pm.authenticate(Credential::new("wrong")).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthenticationFailed));
        assert!(session.credential().is_none());
        assert!(runner.calls().iter().all(|c| !c.contains("wrong")));
    }

    #[tokio::test]
    async fn accepted_password_is_kept_for_the_session() {
        if is_root() {
            return;
        }
        let runner = Arc::new(FakeRunner::new().reply("sudo -S -p  -k true", 0, ""));
        let session = Arc::new(Session::new(10));
        let pm = PackageManager::with_runner(runner, Config::default(), Arc::clone(&session));
        pm.authenticate(Credential::new("right")).await.unwrap();
        assert_eq!(session.credential(), Some(Credential::new("right")));
    }
}
