//! 长时间操作的执行器：工作线程 + 事件流
//!
//! 同一时刻只允许一个操作；结果以 `OperationEvent` 发给界面层。

use super::parser::{is_auth_failure, progress_hint};
use super::streaming::{clear_stale_lock_at, run_streaming, DB_LOCK_PATH};
use super::types::{Credential, Source};
use super::EngineError;
use crate::session::{is_root, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// 操作过程中发出的事件；每次执行恰好以一个 `Done` 结束
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    Output(String),
    Progress(u8),
    Status(String),
    Done { success: bool, message: String },
}

/// 一次待执行的操作
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub argv: Vec<String>,
    pub label: String,
    pub credential: Option<Credential>,
    /// 执行前尝试清理的残留锁文件
    pub stale_lock: Option<PathBuf>,
    /// 需要 root 权限（非 root 运行时必须带口令）
    pub needs_privilege: bool,
}

const PACKAGE_EXTENSIONS: [&str; 2] = [".pkg.tar.zst", ".pkg.tar.xz"];

fn owned(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl OperationRequest {
    pub fn new(argv: Vec<String>, label: impl Into<String>) -> Self {
        Self {
            argv,
            label: label.into(),
            credential: None,
            stale_lock: None,
            needs_privilege: false,
        }
    }

    fn privileged(argv: Vec<String>, label: impl Into<String>) -> Self {
        Self {
            needs_privilege: true,
            ..Self::new(argv, label)
        }
    }

    /// 附加口令；root 运行或无需提权时忽略
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = if self.needs_privilege && !is_root() {
            credential
        } else {
            None
        };
        self
    }

    // ===== 操作目录 =====

    /// AUR 包交给助手安装，助手自己会调用 sudo
    pub fn install(name: &str, source: Source, aur_helper: &str) -> Self {
        Self::install_with_label(name, source, aur_helper, "install")
    }

    pub fn reinstall(name: &str, source: Source, aur_helper: &str) -> Self {
        Self::install_with_label(name, source, aur_helper, "reinstall")
    }

    fn install_with_label(name: &str, source: Source, aur_helper: &str, label: &str) -> Self {
        match source {
            Source::Aur => Self::new(owned(&[aur_helper, "-S", name, "--noconfirm"]), label),
            _ => Self::privileged(owned(&["pacman", "-S", name, "--noconfirm"]), label),
        }
    }

    pub fn remove(name: &str) -> Self {
        Self::privileged(owned(&["pacman", "-R", name, "--noconfirm"]), "remove")
    }

    pub fn install_many(names: &[String]) -> Self {
        Self::privileged(batch(&["pacman", "-S", "--noconfirm"], names), "install (repos)")
    }

    pub fn remove_many(names: &[String]) -> Self {
        Self::privileged(batch(&["pacman", "-R", "--noconfirm"], names), "remove (repos)")
    }

    pub fn apply_updates(names: &[String]) -> Self {
        Self::privileged(batch(&["pacman", "-S", "--noconfirm"], names), "apply updates")
    }

    pub fn system_update() -> Self {
        Self::privileged(owned(&["pacman", "-Syu", "--noconfirm"]), "system update")
    }

    pub fn clean_cache() -> Self {
        Self::privileged(owned(&["pacman", "-Sc", "--noconfirm"]), "cache cleaning")
    }

    /// 强制刷新数据库，先清掉残留锁
    pub fn fix_dependencies() -> Self {
        Self {
            stale_lock: Some(PathBuf::from(DB_LOCK_PATH)),
            ..Self::privileged(owned(&["pacman", "-Syy"]), "dependency fix")
        }
    }

    /// 只接受 `.pkg.tar.zst` / `.pkg.tar.xz` 包文件
    pub fn install_local(path: &Path) -> Result<Self, EngineError> {
        let file_name = path.to_string_lossy();
        if !PACKAGE_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext)) {
            return Err(EngineError::NotAPackageFile(path.to_path_buf()));
        }
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let argv = vec![
            "pacman".to_string(),
            "-U".to_string(),
            path.display().to_string(),
            "--noconfirm".to_string(),
        ];
        Ok(Self::privileged(argv, format!("local package installation ({})", basename)))
    }

    /// 孤儿包查询与删除作为一条提权的 shell 管道执行
    pub fn remove_orphans() -> Self {
        Self::privileged(
            owned(&["sh", "-c", "pacman -Qtdq | pacman -Rns --noconfirm -"]),
            "remove orphans",
        )
    }
}

fn batch(prefix: &[&str], names: &[String]) -> Vec<String> {
    let mut argv = owned(prefix);
    argv.extend(names.iter().cloned());
    argv
}

/// 首字母大写，其余小写
fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// 在工作线程中执行操作，事件通过 `tx` 发出
///
/// 已有操作在运行时同步返回 `OperationInProgress`，不影响正在运行的那个。
/// 槽位在发送 `Done` 之前释放。
pub fn execute(
    session: &Arc<Session>,
    request: OperationRequest,
    tx: mpsc::UnboundedSender<OperationEvent>,
) -> Result<JoinHandle<()>, EngineError> {
    let slot = session.begin_operation().ok_or(EngineError::OperationInProgress)?;
    if request.needs_privilege && request.credential.is_none() && !is_root() {
        return Err(EngineError::CredentialRequired);
    }
    let session = Arc::clone(session);
    log::info!("operation started: {}", request.label);

    let handle = std::thread::Builder::new()
        .name("pkger-operation".to_string())
        .spawn(move || {
            let credential = if is_root() { None } else { request.credential };
            let send = |event: OperationEvent| {
                let _ = tx.send(event);
            };

            send(OperationEvent::Status(format!("Starting {}...", request.label)));
            send(OperationEvent::Progress(10));

            if let Some(lock) = &request.stale_lock {
                if clear_stale_lock_at(lock, credential.as_ref()) {
                    send(OperationEvent::Output("Removed pacman lock file".to_string()));
                }
            }

            let mut auth_failed = false;
            let code = run_streaming(
                &request.argv,
                credential.as_ref(),
                |line| {
                    if is_auth_failure(&line) {
                        auth_failed = true;
                    }
                    send(OperationEvent::Output(line));
                },
                Some(|raw: &str| {
                    if let Some(p) = progress_hint(raw) {
                        send(OperationEvent::Progress(p));
                    }
                }),
            );
            send(OperationEvent::Progress(100));

            let label = capitalize(&request.label);
            let (success, message) = if auth_failed && code != 0 {
                session.clear_credential();
                (false, "Authentication failed: incorrect password".to_string())
            } else if code == 0 {
                (true, format!("{} completed successfully!", label))
            } else {
                (false, format!("{} failed with code {}", label, code))
            };
            log::info!("operation finished: {} (exit={})", request.label, code);

            drop(slot);
            send(OperationEvent::Done { success, message });
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str, label: &str) -> OperationRequest {
        OperationRequest::new(owned(&["sh", "-c", script]), label)
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<OperationEvent>) -> Vec<OperationEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.blocking_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn successful_run_emits_full_event_sequence() {
        let session = Arc::new(Session::new(10));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = execute(&session, shell("echo downloading vim; echo done", "INSTALL"), tx).unwrap();
        handle.join().unwrap();
        let events = drain(rx);
        assert_eq!(
            events,
            vec![
                OperationEvent::Status("Starting INSTALL...".to_string()),
                OperationEvent::Progress(10),
                OperationEvent::Output("downloading vim".to_string()),
                OperationEvent::Progress(50),
                OperationEvent::Output("done".to_string()),
                OperationEvent::Progress(100),
                OperationEvent::Done {
                    success: true,
                    message: "Install completed successfully!".to_string(),
                },
            ]
        );
        assert!(!session.operation_running());
    }

    #[test]
    fn failure_reports_exit_code() {
        let session = Arc::new(Session::new(10));
        let (tx, rx) = mpsc::unbounded_channel();
        execute(&session, shell("exit 4", "system update"), tx).unwrap().join().unwrap();
        let last = drain(rx).pop().unwrap();
        assert_eq!(
            last,
            OperationEvent::Done {
                success: false,
                message: "System update failed with code 4".to_string(),
            }
        );
    }

    #[test]
    fn auth_failure_discards_credential() {
        let session = Arc::new(Session::new(10));
        session.set_credential(Credential::new("pw"));
        let (tx, rx) = mpsc::unbounded_channel();
        execute(&session, shell("echo 'Sorry, try again.'; exit 1", "remove"), tx)
            .unwrap()
            .join()
            .unwrap();
        let last = drain(rx).pop().unwrap();
        assert_eq!(
            last,
            OperationEvent::Done {
                success: false,
                message: "Authentication failed: incorrect password".to_string(),
            }
        );
        assert!(session.credential().is_none());
    }

    #[test]
    fn second_operation_is_rejected_while_one_runs() {
        let session = Arc::new(Session::new(10));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = execute(&session, shell("sleep 1", "install"), tx).unwrap();

        let (tx2, rx2) = mpsc::unbounded_channel();
        let err = execute(&session, shell("echo never", "remove"), tx2).unwrap_err();
        assert!(matches!(err, EngineError::OperationInProgress));
        assert!(drain(rx2).is_empty());

        handle.join().unwrap();
        let events = drain(rx);
        assert!(matches!(events.last(), Some(OperationEvent::Done { success: true, .. })));
    }

    #[test]
    fn new_operation_is_accepted_once_done_arrives() {
        let session = Arc::new(Session::new(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = execute(&session, shell("true", "clean"), tx).unwrap();
        while let Some(event) = rx.blocking_recv() {
            if matches!(event, OperationEvent::Done { .. }) {
                break;
            }
        }
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let second = execute(&session, shell("true", "clean"), tx2).unwrap();
        handle.join().unwrap();
        second.join().unwrap();
    }

    #[test]
    fn privileged_request_without_credential_is_refused() {
        if is_root() {
            return;
        }
        let session = Arc::new(Session::new(10));
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = execute(&session, OperationRequest::system_update(), tx).unwrap_err();
        assert!(matches!(err, EngineError::CredentialRequired));
        assert!(!session.operation_running());
    }

    #[test]
    fn catalogue_builds_expected_commands() {
        let aur = OperationRequest::install("yay-bin", Source::Aur, "paru");
        assert_eq!(aur.argv, owned(&["paru", "-S", "yay-bin", "--noconfirm"]));
        assert!(!aur.needs_privilege);

        let official = OperationRequest::reinstall("vim", Source::Official, "yay");
        assert_eq!(official.argv, owned(&["pacman", "-S", "vim", "--noconfirm"]));
        assert_eq!(official.label, "reinstall");
        assert!(official.needs_privilege);

        let names = owned(&["a", "b"]);
        assert_eq!(
            OperationRequest::remove_many(&names).argv,
            owned(&["pacman", "-R", "--noconfirm", "a", "b"])
        );
        assert_eq!(
            OperationRequest::fix_dependencies().stale_lock,
            Some(PathBuf::from("/var/lib/pacman/db.lck"))
        );

        let local = OperationRequest::install_local(Path::new("/tmp/pkgs/foo-1.0-1-x86_64.pkg.tar.zst")).unwrap();
        assert_eq!(local.label, "local package installation (foo-1.0-1-x86_64.pkg.tar.zst)");
        assert_eq!(local.argv[2], "/tmp/pkgs/foo-1.0-1-x86_64.pkg.tar.zst");
    }

    #[test]
    fn credential_is_dropped_for_unprivileged_requests() {
        let request = OperationRequest::install("yay-bin", Source::Aur, "yay")
            .with_credential(Some(Credential::new("pw")));
        assert!(request.credential.is_none());
    }

    #[test]
    fn labels_are_capitalized() {
        assert_eq!(capitalize("cache cleaning"), "Cache cleaning");
        assert_eq!(capitalize("INSTALL (Repos)"), "Install (repos)");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn local_install_rejects_non_package_files() {
        let err = OperationRequest::install_local(Path::new("/etc/hostname")).unwrap_err();
        assert!(matches!(err, EngineError::NotAPackageFile(_)));
        assert!(OperationRequest::install_local(Path::new("foo-1.0-1-any.pkg.tar.xz")).is_ok());
        assert!(OperationRequest::install_local(Path::new("foo.pkg.tar.gz")).is_err());
    }

    #[test]
    fn stale_lock_is_cleared_before_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("db.lck");
        std::fs::write(&lock, "").unwrap();
        let request = OperationRequest {
            stale_lock: Some(lock.clone()),
            ..shell("echo synced", "dependency fix")
        };

        let session = Arc::new(Session::new(10));
        let (tx, rx) = mpsc::unbounded_channel();
        execute(&session, request, tx).unwrap().join().unwrap();
        let events = drain(rx);
        assert_eq!(events[2], OperationEvent::Output("Removed pacman lock file".to_string()));
        assert_eq!(events[3], OperationEvent::Output("synced".to_string()));
        assert!(!lock.exists());
    }

    #[test]
    fn absent_lock_emits_no_removal_line() {
        let dir = tempfile::tempdir().unwrap();
        let request = OperationRequest {
            stale_lock: Some(dir.path().join("db.lck")),
            ..shell("true", "dependency fix")
        };
        let session = Arc::new(Session::new(10));
        let (tx, rx) = mpsc::unbounded_channel();
        execute(&session, request, tx).unwrap().join().unwrap();
        assert!(drain(rx)
            .iter()
            .all(|e| *e != OperationEvent::Output("Removed pacman lock file".to_string())));
    }
}
