//! PackageManager 相关数据类型定义

use std::collections::BTreeMap;
use std::fmt;

/// 未知字段的占位符，显示层无需区分"缺失"
pub const PLACEHOLDER: &str = "-";

/// 软件包来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Official,
    Aur,
    Installed,
    Unknown,
}

impl Source {
    pub fn tag(&self) -> &'static str {
        match self {
            Source::Official => "official",
            Source::Aur => "aur",
            Source::Installed => "installed",
            Source::Unknown => "unknown",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "official" | "repo" => Some(Source::Official),
            "aur" => Some(Source::Aur),
            "installed" | "local" => Some(Source::Installed),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// 可能是 `repo/name` 形式
    pub name: String,
    pub pkg_name: String,
    pub version: String,
    pub description: String,
    pub repository: String,
    pub source: Source,
    pub is_installed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    Yes,
    No,
}

impl fmt::Display for Installed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Installed::Yes => f.write_str("Yes"),
            Installed::No => f.write_str("No"),
        }
    }
}

/// 包详情
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDetails {
    pub name: String,
    pub version: String,
    pub repository: String,
    pub installed: Installed,
    pub installed_size: String,
    pub license: String,
    pub url: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub required_by: Vec<String>,
}

impl PackageDetails {
    pub fn new(name: &str, repository: &str) -> Self {
        Self {
            name: name.to_string(),
            version: PLACEHOLDER.to_string(),
            repository: repository.to_string(),
            installed: Installed::No,
            installed_size: PLACEHOLDER.to_string(),
            license: PLACEHOLDER.to_string(),
            url: PLACEHOLDER.to_string(),
            description: PLACEHOLDER.to_string(),
            dependencies: Vec::new(),
            required_by: Vec::new(),
        }
    }
}

/// 可升级的包：`name old -> new`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateItem {
    pub name: String,
    pub from_version: String,
    pub to_version: String,
}

/// `pacman -Sl` 中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPackage {
    pub name: String,
    pub installed: bool,
}

/// 仓库名 -> 包列表
pub type RepoListing = BTreeMap<String, Vec<RepoPackage>>;

/// 会话期间缓存的提权口令，Debug 输出不暴露内容
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(********)")
    }
}
