//! 行式前端：读取命令，派发后台任务，在主循环里应用结果

pub mod commands;
pub mod state;

use crate::config::Config;
use crate::export::{details_file_name, render_details, render_repo_listing, ExportWriter, REPOS_FILE_NAME};
use crate::package_manager::{execute, Credential, OperationRequest, PackageManager};
use crate::session::Session;
use anyhow::Result;
use commands::{Intent, HELP};
use state::{App, AppEvent};
use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 把后台任务的结果（或 panic）转成事件送回主循环
fn spawn_worker<F>(tx: &mpsc::Sender<AppEvent>, work: F)
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let event = match tokio::spawn(work).await {
            Ok(event) => event,
            Err(e) => AppEvent::Error(format!("background task failed: {}", e)),
        };
        let _ = tx.send(event).await;
    });
}

/// stdin 是阻塞读取，放在单独线程里
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

struct Dispatcher {
    pm: PackageManager,
    session: Arc<Session>,
    exporter: ExportWriter,
    tx: mpsc::Sender<AppEvent>,
    awaiting_password: bool,
}

impl Dispatcher {
    fn handle_line(&mut self, line: &str, app: &mut App) -> Vec<String> {
        if self.awaiting_password {
            self.awaiting_password = false;
            let pm = self.pm.clone();
            let credential = Credential::new(line.trim_end_matches(['\r', '\n']));
            spawn_worker(&self.tx, async move {
                AppEvent::Authenticated(pm.authenticate(credential).await.map_err(|e| e.to_string()))
            });
            return Vec::new();
        }

        match commands::parse(line) {
            Ok(Some(intent)) => self.dispatch(intent, app),
            Ok(None) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }

    fn dispatch(&mut self, intent: Intent, app: &mut App) -> Vec<String> {
        let helper = self.pm.aur_helper().to_string();
        match intent {
            Intent::Search { keyword, source } => {
                let seq = self.session.searches.issue();
                let pm = self.pm.clone();
                spawn_worker(&self.tx, async move {
                    let records = pm.search(&keyword, source).await;
                    AppEvent::SearchResults { seq, source, keyword, records }
                });
                vec![format!("Searching {}...", source)]
            }
            Intent::Info { name, source, dependencies } => {
                let seq = self.session.details.issue();
                let pm = self.pm.clone();
                spawn_worker(&self.tx, async move {
                    let details = pm.get_details(&name, source, dependencies).await;
                    AppEvent::DetailsLoaded { seq, details }
                });
                Vec::new()
            }
            Intent::Install { names, source } => match names.as_slice() {
                [name] => self.start_operation(OperationRequest::install(name, source, &helper)),
                _ => self.start_operation(OperationRequest::install_many(&names)),
            },
            Intent::Reinstall { name, source } => {
                self.start_operation(OperationRequest::reinstall(&name, source, &helper))
            }
            Intent::Remove { names } => match names.as_slice() {
                [name] => self.start_operation(OperationRequest::remove(name)),
                _ => self.start_operation(OperationRequest::remove_many(&names)),
            },
            Intent::InstallLocal { path } => {
                if !path.is_file() {
                    return vec![format!("no such file: {}", path.display())];
                }
                match OperationRequest::install_local(&path) {
                    Ok(request) => self.start_operation(request),
                    Err(e) => vec![format!("error: {}", e)],
                }
            }
            Intent::SystemUpdate => self.start_operation(OperationRequest::system_update()),
            Intent::CleanCache => self.start_operation(OperationRequest::clean_cache()),
            Intent::FixDependencies => self.start_operation(OperationRequest::fix_dependencies()),
            Intent::RemoveOrphans => self.start_operation(OperationRequest::remove_orphans()),
            Intent::ScanUpdates => {
                let pm = self.pm.clone();
                spawn_worker(&self.tx, async move { AppEvent::UpdatesLoaded(pm.scan_updates().await) });
                vec!["Checking for updates...".to_string()]
            }
            Intent::ApplyUpdates { names } => {
                let names = if names.is_empty() {
                    app.updates.iter().map(|u| u.name.clone()).collect()
                } else {
                    names
                };
                if names.is_empty() {
                    return vec!["nothing to apply, run 'updates' first".to_string()];
                }
                self.start_operation(OperationRequest::apply_updates(&names))
            }
            Intent::Repositories => {
                let pm = self.pm.clone();
                spawn_worker(&self.tx, async move {
                    AppEvent::RepositoriesLoaded(pm.list_repositories().await)
                });
                vec!["Loading repositories...".to_string()]
            }
            Intent::Installed => {
                let pm = self.pm.clone();
                spawn_worker(&self.tx, async move { AppEvent::InstalledLoaded(pm.list_installed().await) });
                Vec::new()
            }
            Intent::ExportDetails => match &app.details {
                Some(details) => self.export(&details_file_name(&details.name), &render_details(details)),
                None => vec!["no details loaded, use 'info' first".to_string()],
            },
            Intent::ExportRepositories => match &app.repositories {
                Some(listing) => self.export(REPOS_FILE_NAME, &render_repo_listing(listing)),
                None => vec!["no repository listing loaded, use 'repos' first".to_string()],
            },
            Intent::Login => {
                self.awaiting_password = true;
                vec!["Password:".to_string()]
            }
            Intent::Logout => {
                self.session.clear_credential();
                vec!["Credential forgotten".to_string()]
            }
            Intent::Help => vec![HELP.to_string()],
            Intent::Quit => {
                app.should_quit = true;
                Vec::new()
            }
        }
    }

    /// 启动操作，把操作事件转发进主循环
    fn start_operation(&self, request: OperationRequest) -> Vec<String> {
        let request = request.with_credential(self.session.credential());
        let (op_tx, mut op_rx) = mpsc::unbounded_channel();
        if let Err(e) = execute(&self.session, request, op_tx) {
            return vec![format!("error: {}", e)];
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = op_rx.recv().await {
                if tx.send(AppEvent::Operation(event)).await.is_err() {
                    break;
                }
            }
        });
        Vec::new()
    }

    fn export(&self, file_name: &str, content: &str) -> Vec<String> {
        match self.exporter.save(file_name, content) {
            Ok(path) => vec![format!("Saved to {}", path.display())],
            Err(e) => vec![format!("error: export failed: {:#}", e)],
        }
    }
}

pub async fn run(config: Config, session: Arc<Session>) -> Result<()> {
    let mut app = App::new(Arc::clone(&session));
    let (tx, mut rx) = mpsc::channel(32);
    let mut dispatcher = Dispatcher {
        pm: PackageManager::new(config.clone(), Arc::clone(&session)),
        session,
        exporter: ExportWriter::new(config.export_dir.clone()),
        tx,
        awaiting_password: false,
    };
    let mut input = spawn_stdin_reader();

    println!("pkger ({} for AUR), type 'help' for commands", config.aur_helper);

    loop {
        let lines = tokio::select! {
            line = input.recv() => match line {
                Some(line) => dispatcher.handle_line(&line, &mut app),
                None => break,
            },
            Some(event) = rx.recv() => app.apply(event),
        };
        for line in lines {
            println!("{}", line);
        }
        if app.should_quit {
            break;
        }
    }

    if dispatcher.session.operation_running() {
        log::warn!("exiting while an operation is still running");
    }
    Ok(())
}
