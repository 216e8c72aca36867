//! 流式命令执行（install / remove / update 等长时间操作）
//!
//! 必须在工作线程中调用：读取子进程输出时会阻塞。

use super::parser::clean_terminal_output;
use super::types::Credential;
use crate::session::is_root;
use std::io::Read;
use std::path::Path;

pub const SUDO: &str = "sudo";
pub const DB_LOCK_PATH: &str = "/var/lib/pacman/db.lck";

/// 口令在输出中被回显时的替换文本
const REDACTED: &str = "********";

/// 包装后实际执行的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    pub program: String,
    pub args: Vec<String>,
    /// 写入 stdin 的内容；带口令时为 `secret\n`
    pub stdin: Option<Vec<u8>>,
}

/// 按需用 `sudo -S` 包装命令
///
/// 提供口令且 argv 不是以 sudo 开头时，口令只通过 stdin 传一次，
/// 不会出现在参数列表里；`-k` 让 sudo 每次都读走口令，不留给子命令，
/// `-p ""` 关掉 sudo 自己的提示符。
pub fn prepare_command(argv: &[String], credential: Option<&Credential>) -> Option<PreparedCommand> {
    let (program, rest) = argv.split_first()?;
    match credential {
        Some(secret) if program != SUDO => {
            let mut args = vec!["-k".to_string(), "-S".to_string(), "-p".to_string(), String::new()];
            args.extend(argv.iter().cloned());
            let mut stdin = secret.expose().as_bytes().to_vec();
            stdin.push(b'\n');
            Some(PreparedCommand {
                program: SUDO.to_string(),
                args,
                stdin: Some(stdin),
            })
        }
        _ => Some(PreparedCommand {
            program: program.clone(),
            args: rest.to_vec(),
            stdin: None,
        }),
    }
}

/// 把输出中出现的口令替换掉
pub fn redact(line: &str, secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() && line.contains(s) => line.replace(s, REDACTED),
        _ => line.to_string(),
    }
}

/// 执行命令并逐行回调合并后的 stdout + stderr
///
/// `\n` 与 `\r` 都视为行结束（pacman 的进度条靠 `\r` 原地刷新）。
/// 每行先交给 `on_line`，再把原始行交给 `on_hint`，之后才读下一行。
/// 返回子进程退出码；启动或读取失败时回调一行 `ERROR: ...` 并返回 1。
pub fn run_streaming<F, H>(
    argv: &[String],
    credential: Option<&Credential>,
    mut on_line: F,
    mut on_hint: Option<H>,
) -> i32
where
    F: FnMut(String),
    H: FnMut(&str),
{
    let Some(prepared) = prepare_command(argv, credential) else {
        on_line("ERROR: empty command".to_string());
        return 1;
    };
    let secret = credential.map(|c| c.expose());

    let expr = duct::cmd(prepared.program.as_str(), &prepared.args)
        .stderr_to_stdout()
        .unchecked();
    let expr = match prepared.stdin {
        Some(bytes) => expr.stdin_bytes(bytes),
        None => expr.stdin_null(),
    };

    let reader = match expr.reader() {
        Ok(reader) => reader,
        Err(e) => {
            log::warn!("failed to start {}: {}", prepared.program, e);
            on_line(format!("ERROR: {}", e));
            return 1;
        }
    };

    let mut emit = |segment: &[u8]| {
        let raw = redact(&String::from_utf8_lossy(segment), secret);
        let cleaned = clean_terminal_output(&raw);
        if cleaned.trim().is_empty() {
            return;
        }
        on_line(cleaned);
        if let Some(hint) = on_hint.as_mut() {
            hint(&raw);
        }
    };

    let mut buffer = [0u8; 1024];
    let mut line_buffer: Vec<u8> = Vec::new();
    loop {
        match (&reader).read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                for &b in &buffer[..n] {
                    match b {
                        b'\n' | b'\r' => {
                            emit(&line_buffer);
                            line_buffer.clear();
                        }
                        _ => line_buffer.push(b),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                emit(&line_buffer);
                drop(emit);
                log::warn!("reading output of {} failed: {}", prepared.program, e);
                on_line(format!("ERROR: {}", e));
                return 1;
            }
        }
    }
    emit(&line_buffer);
    drop(emit);

    match reader.try_wait() {
        Ok(Some(output)) => output.status.code().unwrap_or(1),
        Ok(None) => {
            log::warn!("{} still running after EOF", prepared.program);
            1
        }
        Err(e) => {
            on_line(format!("ERROR: {}", e));
            1
        }
    }
}

/// 尝试删除残留的锁文件（仅在确认没有 pacman 进程在运行时）
///
/// 先直接删除；没有权限时再提权：root 或有口令时经 sudo -S，
/// 否则退回 `sudo -n`，凭证过期时静默失败。返回是否删除成功。
pub fn clear_stale_lock_at(path: &Path, credential: Option<&Credential>) -> bool {
    if !path.exists() {
        return false;
    }
    let any_pacman = duct::cmd("pgrep", ["-x", "pacman"])
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if any_pacman {
        log::warn!("pacman is running, leaving {} in place", path.display());
        return false;
    }

    match std::fs::remove_file(path) {
        Ok(()) => return true,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {}
        Err(e) => {
            log::warn!("removing {} failed: {}", path.display(), e);
            return false;
        }
    }

    let target = path.display().to_string();
    let argv: Vec<String> = if is_root() || credential.is_some() {
        vec!["rm".into(), "-f".into(), target]
    } else {
        vec![SUDO.into(), "-n".into(), "rm".into(), "-f".into(), target]
    };
    let credential = if is_root() { None } else { credential };
    let code = run_streaming(
        &argv,
        credential,
        |line| log::debug!("rm lock: {}", line),
        None::<fn(&str)>,
    );
    if code != 0 {
        log::warn!("removing {} failed (exit={})", path.display(), code);
    }
    code == 0
}
