//! 有界查询：搜索 / 详情 / 更新列表共用的非交互命令执行

use super::types::Credential;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// 一次查询命令
#[derive(Debug, Clone)]
pub struct Query {
    pub program: String,
    pub args: Vec<String>,
    /// 写入子进程 stdin 的口令（仅用于 sudo 校验）
    pub stdin: Option<Credential>,
    pub timeout: Duration,
}

impl Query {
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            timeout,
        }
    }

    pub fn with_stdin(mut self, credential: Credential) -> Self {
        self.stdin = Some(credential);
        self
    }

    /// 用于日志的命令行，stdin 内容不会出现在这里
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub code: i32,
    pub stdout: String,
}

impl QueryOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// 查询执行器，测试中可以替换成内存实现
pub trait QueryRunner: Send + Sync + 'static {
    fn run(&self, query: Query) -> impl Future<Output = Result<QueryOutput, QueryError>> + Send;
}

/// 基于 tokio::process 的真实执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl QueryRunner for ProcessRunner {
    fn run(&self, query: Query) -> impl Future<Output = Result<QueryOutput, QueryError>> + Send {
        async move {
            let mut cmd = tokio::process::Command::new(&query.program);
            cmd.args(&query.args);
            cmd.stdin(if query.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            // 超时后 future 被丢弃，子进程随之被杀
            cmd.kill_on_drop(true);

            let mut child = cmd.spawn().map_err(|source| QueryError::Spawn {
                program: query.program.clone(),
                source,
            })?;

            if let (Some(secret), Some(mut stdin)) = (&query.stdin, child.stdin.take()) {
                let mut payload = secret.expose().as_bytes().to_vec();
                payload.push(b'\n');
                if let Err(e) = stdin.write_all(&payload).await {
                    log::debug!("{}: stdin closed early: {}", query.program, e);
                }
            }

            match tokio::time::timeout(query.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => Ok(QueryOutput {
                    code: output.status.code().unwrap_or(1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                }),
                Ok(Err(source)) => Err(QueryError::Io {
                    program: query.program,
                    source,
                }),
                Err(_) => Err(QueryError::Timeout {
                    program: query.program,
                    timeout: query.timeout,
                }),
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    //! 内存查询执行器：按命令行返回预置输出并记录调用

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum Reply {
        Output(i32, String),
        Timeout,
    }

    #[derive(Default)]
    pub struct FakeRunner {
        replies: Mutex<HashMap<String, Reply>>,
        calls: Mutex<Vec<String>>,
        count: AtomicUsize,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, command: &str, code: i32, stdout: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(command.to_string(), Reply::Output(code, stdout.to_string()));
            self
        }

        pub fn timeout(self, command: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(command.to_string(), Reply::Timeout);
            self
        }

        pub fn call_count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl QueryRunner for FakeRunner {
        fn run(&self, query: Query) -> impl Future<Output = Result<QueryOutput, QueryError>> + Send {
            let line = query.display();
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(line.clone());
            let reply = self.replies.lock().unwrap().get(&line).cloned();
            async move {
                match reply {
                    Some(Reply::Output(code, stdout)) => Ok(QueryOutput { code, stdout }),
                    Some(Reply::Timeout) => Err(QueryError::Timeout {
                        program: query.program,
                        timeout: query.timeout,
                    }),
                    None => Ok(QueryOutput {
                        code: 1,
                        stdout: String::new(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let query = Query::new("sh", ["-c", "echo hello; exit 3"], Duration::from_secs(5));
        let output = ProcessRunner.run(query).await.unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stdout, "hello\n");
    }

    #[tokio::test]
    async fn times_out_instead_of_hanging() {
        let query = Query::new("sleep", ["5"], Duration::from_millis(100));
        let err = ProcessRunner.run(query).await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let query = Query::new("pkger-no-such-program", Vec::<String>::new(), Duration::from_secs(1));
        let err = ProcessRunner.run(query).await.unwrap_err();
        assert!(matches!(err, QueryError::Spawn { .. }));
    }

    #[tokio::test]
    async fn stdin_secret_reaches_child_but_not_display() {
        let query = Query::new("sh", ["-c", "read line; echo \"got=[$line]\""], Duration::from_secs(5))
            .with_stdin(Credential::new("s3cret"));
        assert!(!query.display().contains("s3cret"));
        let output = ProcessRunner.run(query).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "got=[s3cret]\n");
    }
}
