use crate::package_manager::{
    OperationEvent, PackageDetails, PackageRecord, RepoListing, Source, UpdateItem,
};
use crate::session::Session;
use std::sync::Arc;

/// 后台任务发回主循环的事件
#[derive(Debug)]
pub enum AppEvent {
    SearchResults {
        seq: u64,
        source: Source,
        keyword: String,
        records: Vec<PackageRecord>,
    },
    DetailsLoaded {
        seq: u64,
        details: PackageDetails,
    },
    UpdatesLoaded(Vec<UpdateItem>),
    RepositoriesLoaded(RepoListing),
    InstalledLoaded(Vec<PackageRecord>),
    Operation(OperationEvent),
    Authenticated(Result<(), String>),
    Error(String),
}

pub const READY: &str = "Ready";

pub struct App {
    session: Arc<Session>,
    pub results: Vec<PackageRecord>,
    pub details: Option<PackageDetails>,
    pub updates: Vec<UpdateItem>,
    pub repositories: Option<RepoListing>,
    pub installed: Vec<PackageRecord>,
    pub status: String,
    pub progress: u8,
    pub should_quit: bool,
}

impl App {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            results: Vec::new(),
            details: None,
            updates: Vec::new(),
            repositories: None,
            installed: Vec::new(),
            status: READY.to_string(),
            progress: 0,
            should_quit: false,
        }
    }

    /// 应用一个事件，返回需要打印的行
    ///
    /// 搜索与详情结果带序号，比已应用的旧就丢弃。
    pub fn apply(&mut self, event: AppEvent) -> Vec<String> {
        match event {
            AppEvent::SearchResults {
                seq,
                source,
                keyword,
                records,
            } => {
                if !self.session.searches.accept(seq) {
                    log::debug!("dropping stale search #{} for '{}'", seq, keyword);
                    return Vec::new();
                }
                let mut lines = vec![format!(
                    "{} result(s) for '{}' in {}",
                    records.len(),
                    keyword,
                    source
                )];
                lines.extend(records.iter().map(render_record));
                self.results = records;
                lines
            }
            AppEvent::DetailsLoaded { seq, details } => {
                if !self.session.details.accept(seq) {
                    log::debug!("dropping stale details #{} for {}", seq, details.name);
                    return Vec::new();
                }
                let lines = crate::export::render_details(&details)
                    .lines()
                    .map(str::to_string)
                    .collect();
                self.details = Some(details);
                lines
            }
            AppEvent::UpdatesLoaded(items) => {
                let mut lines = if items.is_empty() {
                    vec!["System is up to date".to_string()]
                } else {
                    vec![format!("{} update(s) available", items.len())]
                };
                lines.extend(
                    items
                        .iter()
                        .map(|u| format!("  {} {} -> {}", u.name, u.from_version, u.to_version)),
                );
                self.updates = items;
                lines
            }
            AppEvent::RepositoriesLoaded(listing) => {
                let lines = listing
                    .iter()
                    .map(|(repo, pkgs)| {
                        let installed = pkgs.iter().filter(|p| p.installed).count();
                        format!("[{}] {} packages, {} installed", repo, pkgs.len(), installed)
                    })
                    .collect();
                self.repositories = Some(listing);
                lines
            }
            AppEvent::InstalledLoaded(records) => {
                let mut lines = vec![format!("{} installed package(s)", records.len())];
                lines.extend(records.iter().map(|r| format!("  {} {}", r.name, r.version)));
                self.installed = records;
                lines
            }
            AppEvent::Operation(event) => self.apply_operation(event),
            AppEvent::Authenticated(Ok(())) => vec!["Authenticated".to_string()],
            AppEvent::Authenticated(Err(message)) | AppEvent::Error(message) => {
                vec![format!("error: {}", message)]
            }
        }
    }

    fn apply_operation(&mut self, event: OperationEvent) -> Vec<String> {
        match event {
            OperationEvent::Output(line) => vec![format!("  {}", line)],
            OperationEvent::Progress(p) => {
                self.progress = p;
                Vec::new()
            }
            OperationEvent::Status(text) => {
                self.status = text.clone();
                vec![text]
            }
            OperationEvent::Done { success, message } => {
                self.status = READY.to_string();
                self.progress = 0;
                let marker = if success { "ok" } else { "failed" };
                vec![format!("[{}] {}", marker, message)]
            }
        }
    }
}

fn render_record(record: &PackageRecord) -> String {
    let marker = if record.is_installed { " [installed]" } else { "" };
    let mut line = format!("  {} {}{}", record.name, record.version, marker);
    if !record.description.is_empty() {
        line.push_str("\n      ");
        line.push_str(&record.description);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            pkg_name: name.to_string(),
            version: "1.0-1".to_string(),
            description: String::new(),
            repository: "extra".to_string(),
            source: Source::Official,
            is_installed: false,
        }
    }

    #[test]
    fn stale_search_results_are_dropped() {
        let session = Arc::new(Session::new(10));
        let mut app = App::new(Arc::clone(&session));
        let old = session.searches.issue();
        let new = session.searches.issue();

        let lines = app.apply(AppEvent::SearchResults {
            seq: new,
            source: Source::Official,
            keyword: "vim".to_string(),
            records: vec![record("vim")],
        });
        assert_eq!(lines.len(), 2);

        let lines = app.apply(AppEvent::SearchResults {
            seq: old,
            source: Source::Official,
            keyword: "vi".to_string(),
            records: vec![record("vi"), record("nvi")],
        });
        assert!(lines.is_empty());
        assert_eq!(app.results.len(), 1);
        assert_eq!(app.results[0].name, "vim");
    }

    #[test]
    fn stale_details_are_dropped() {
        let session = Arc::new(Session::new(10));
        let mut app = App::new(Arc::clone(&session));
        let old = session.details.issue();
        let new = session.details.issue();
        app.apply(AppEvent::DetailsLoaded {
            seq: new,
            details: PackageDetails::new("git", "extra"),
        });
        app.apply(AppEvent::DetailsLoaded {
            seq: old,
            details: PackageDetails::new("vim", "extra"),
        });
        assert_eq!(app.details.as_ref().map(|d| d.name.as_str()), Some("git"));
    }

    #[test]
    fn done_resets_progress_and_status() {
        let mut app = App::new(Arc::new(Session::new(10)));
        app.apply(AppEvent::Operation(OperationEvent::Status("Starting install...".to_string())));
        app.apply(AppEvent::Operation(OperationEvent::Progress(75)));
        assert_eq!(app.progress, 75);
        assert_eq!(app.status, "Starting install...");

        let lines = app.apply(AppEvent::Operation(OperationEvent::Done {
            success: false,
            message: "Install failed with code 1".to_string(),
        }));
        assert_eq!(lines, vec!["[failed] Install failed with code 1"]);
        assert_eq!(app.progress, 0);
        assert_eq!(app.status, READY);
    }

    #[test]
    fn empty_update_scan_reports_up_to_date() {
        let mut app = App::new(Arc::new(Session::new(10)));
        let lines = app.apply(AppEvent::UpdatesLoaded(Vec::new()));
        assert_eq!(lines, vec!["System is up to date"]);
    }
}
