//! 三种来源的包搜索

use super::parser::{
    parse_aur_search, parse_installed_search, parse_official_search, parse_query_version,
};
use super::query::{Query, QueryRunner};
use super::types::{PackageRecord, Source};
use super::PackageManager;

impl<R: QueryRunner> PackageManager<R> {
    /// 搜索软件包；任何失败都只返回空列表
    ///
    /// 非 installed 来源会对每个结果再跑一次 `pacman -Q` 判断安装状态，
    /// n 个结果就是 n 次子进程调用。
    pub async fn search(&self, keyword: &str, source: Source) -> Vec<PackageRecord> {
        if keyword.trim().is_empty() {
            return Vec::new();
        }
        let results = match source {
            Source::Aur => self.search_aur(keyword).await,
            Source::Installed => self.search_installed(keyword).await,
            Source::Official | Source::Unknown => self.search_official(keyword).await,
        };
        log::info!("search {} '{}': {} results", source, keyword, results.len());
        results
    }

    /// 搜索官方仓库 (pacman -Ss)
    async fn search_official(&self, keyword: &str) -> Vec<PackageRecord> {
        let query = Query::new("pacman", ["-Ss", keyword], self.config.search_timeout());
        match self.run_query(query).await {
            Some(out) => self.mark_installed(parse_official_search(&out.stdout)).await,
            None => Vec::new(),
        }
    }

    /// 搜索 AUR (yay -Ss)
    async fn search_aur(&self, keyword: &str) -> Vec<PackageRecord> {
        let query = Query::new(&self.config.aur_helper, ["-Ss", keyword], self.config.search_timeout());
        match self.run_query(query).await {
            Some(out) => self.mark_installed(parse_aur_search(&out.stdout)).await,
            None => Vec::new(),
        }
    }

    /// 搜索本地已安装包 (pacman -Qs)，版本号逐个用 pacman -Q 补齐
    async fn search_installed(&self, keyword: &str) -> Vec<PackageRecord> {
        let query = Query::new("pacman", ["-Qs", keyword], self.config.search_timeout());
        let Some(out) = self.run_query(query).await else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for hit in parse_installed_search(&out.stdout) {
            let version_query =
                Query::new("pacman", ["-Q", hit.name.as_str()], self.config.point_query_timeout());
            let version = self
                .run_query(version_query)
                .await
                .filter(|o| o.success())
                .and_then(|o| parse_query_version(&o.stdout))
                .unwrap_or_default();
            results.push(PackageRecord {
                pkg_name: hit.name.clone(),
                name: hit.name,
                version,
                description: hit.description,
                repository: "installed".to_string(),
                source: Source::Installed,
                is_installed: true,
            });
        }
        results
    }

    async fn mark_installed(&self, candidates: Vec<PackageRecord>) -> Vec<PackageRecord> {
        let mut results = Vec::with_capacity(candidates.len());
        for record in candidates {
            let is_installed = self.is_installed(&record.pkg_name).await;
            results.push(PackageRecord {
                is_installed,
                ..record
            });
        }
        results
    }
}
