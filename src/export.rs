//! 纯文本导出：包详情与仓库目录

use crate::package_manager::{PackageDetails, RepoListing};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub const REPOS_FILE_NAME: &str = "repositories-list.txt";

fn join_or_placeholder(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join("\n")
    }
}

/// 详情导出文本
pub fn render_details(details: &PackageDetails) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name: {}\n", details.name));
    out.push_str(&format!("Version: {}\n", details.version));
    out.push_str(&format!("Repository: {}\n", details.repository));
    out.push_str(&format!("Installed: {}\n", details.installed));
    out.push_str(&format!("Installed Size: {}\n", details.installed_size));
    out.push_str(&format!("License: {}\n", details.license));
    out.push_str(&format!("URL: {}\n", details.url));
    out.push_str(&format!("\nDescription:\n{}\n", details.description));
    out.push_str(&format!("\nDependencies:\n{}\n", join_or_placeholder(&details.dependencies)));
    out.push_str(&format!("\nRequired By:\n{}\n", join_or_placeholder(&details.required_by)));
    out
}

/// 仓库目录导出文本；仓库按名字排序，包在仓库内按名字排序
pub fn render_repo_listing(listing: &RepoListing) -> String {
    let mut out = String::new();
    for (repo, packages) in listing {
        out.push_str(&format!("[{}]\n", repo));
        let mut packages: Vec<_> = packages.iter().collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        for pkg in packages {
            let marker = if pkg.installed { " * " } else { "   " };
            out.push_str(marker);
            out.push_str(&pkg.name);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// 详情导出的默认文件名；组合名里的 `/` 换成 `-`
pub fn details_file_name(name: &str) -> String {
    format!("{}-details.txt", name.replace('/', "-"))
}

/// 把导出内容写到固定目录
pub struct ExportWriter {
    base_dir: PathBuf,
}

impl ExportWriter {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn save(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("cannot create {}", self.base_dir.display()))?;
        let path = self.base_dir.join(file_name);
        fs::write(&path, content).with_context(|| format!("cannot write {}", path.display()))?;
        log::info!("exported {}", path.display());
        Ok(path)
    }
}
