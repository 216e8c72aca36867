//! 待更新列表与仓库目录

use super::parser::{parse_installed_list, parse_pending_updates, parse_repo_listing};
use super::query::{Query, QueryRunner};
use super::types::{PackageRecord, RepoListing, UpdateItem};
use super::PackageManager;

impl<R: QueryRunner> PackageManager<R> {
    /// 检查可用更新 (pacman -Qu)，失败时为空
    pub async fn scan_updates(&self) -> Vec<UpdateItem> {
        let query = Query::new("pacman", ["-Qu"], self.config.updates_timeout());
        self.run_query(query)
            .await
            .map(|out| parse_pending_updates(&out.stdout))
            .unwrap_or_default()
    }

    /// 列出所有仓库及其软件包 (pacman -Sl)
    pub async fn list_repositories(&self) -> RepoListing {
        let query = Query::new("pacman", ["-Sl"], self.config.listing_timeout());
        self.run_query(query)
            .await
            .map(|out| parse_repo_listing(&out.stdout))
            .unwrap_or_default()
    }

    /// 列出全部已安装包 (pacman -Q)
    pub async fn list_installed(&self) -> Vec<PackageRecord> {
        let query = Query::new("pacman", ["-Q"], self.config.listing_timeout());
        self.run_query(query)
            .await
            .map(|out| parse_installed_list(&out.stdout))
            .unwrap_or_default()
    }
}
