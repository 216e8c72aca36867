//! 包详情查询与缓存

use super::parser::{apply_key_values, parse_tree_lines, TREE_LINE_LIMIT};
use super::query::{Query, QueryRunner};
use super::types::{Installed, PackageDetails, Source};
use super::PackageManager;
use std::collections::{HashMap, VecDeque};

/// (来源, 包名, 是否带依赖树)
pub type CacheKey = (Source, String, bool);

/// 详情缓存
///
/// 软上限：插入后超过容量时按插入顺序淘汰最早的四分之一。
/// 命中不会刷新位置，这不是 LRU。
#[derive(Debug)]
pub struct DetailsCache {
    capacity: usize,
    entries: HashMap<CacheKey, PackageDetails>,
    order: VecDeque<CacheKey>,
}

impl DetailsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&PackageDetails> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, details: PackageDetails) {
        if self.entries.insert(key.clone(), details).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() > self.capacity {
            let batch = (self.capacity / 4).max(1);
            for _ in 0..batch {
                match self.order.pop_front() {
                    Some(old) => {
                        self.entries.remove(&old);
                    }
                    None => break,
                }
            }
            log::debug!("details cache evicted {} entries", batch);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<R: QueryRunner> PackageManager<R> {
    /// 获取包详情，先查缓存
    ///
    /// 每个外部调用各自容错：某一步失败只让对应字段保持占位符。
    pub async fn get_details(
        &self,
        name: &str,
        source: Source,
        include_dependencies: bool,
    ) -> PackageDetails {
        let key: CacheKey = (source, name.to_string(), include_dependencies);
        if let Some(hit) = self.session.cached_details(&key) {
            log::debug!("details cache hit: {}", name);
            return hit;
        }

        // 官方搜索结果带 `repo/` 前缀，本地查询要用裸包名
        let (repo_hint, bare) = match name.split_once('/') {
            Some((repo, bare)) => (repo, bare),
            None => (source.tag(), name),
        };
        let mut details = PackageDetails::new(name, repo_hint);

        let local = Query::new("pacman", ["-Qi", bare], self.config.point_query_timeout());
        match self.run_query(local).await {
            Some(out) if out.success() => {
                details.installed = Installed::Yes;
                apply_key_values(&out.stdout, &mut details);
            }
            _ => {
                let program = if source == Source::Aur {
                    self.config.aur_helper.as_str()
                } else {
                    "pacman"
                };
                let remote = Query::new(program, ["-Si", name], self.config.remote_info_timeout());
                if let Some(out) = self.run_query(remote).await.filter(|o| o.success()) {
                    apply_key_values(&out.stdout, &mut details);
                }
            }
        }

        if include_dependencies {
            let forward = Query::new("pactree", [bare], self.config.point_query_timeout());
            if let Some(out) = self.run_query(forward).await.filter(|o| o.success()) {
                details.dependencies = parse_tree_lines(&out.stdout, TREE_LINE_LIMIT);
            }
            let reverse = Query::new("pactree", ["-r", bare], self.config.point_query_timeout());
            if let Some(out) = self.run_query(reverse).await.filter(|o| o.success()) {
                details.required_by = parse_tree_lines(&out.stdout, TREE_LINE_LIMIT);
            }
        }

        self.session.cache_details(key, details.clone());
        details
    }
}
