//! 输出解析函数
//!
//! 所有解析都按行容错：格式不对的行直接跳过，不会让整次解析失败。

use super::types::{
    PackageDetails, PackageRecord, RepoListing, RepoPackage, Source, UpdateItem,
};

/// AUR 助手搜索输出中的来源前缀
pub const AUR_PREFIX: &str = "aur/";

/// 依赖树最多保留的行数
pub const TREE_LINE_LIMIT: usize = 50;

/// 清理终端输出中的 ANSI 转义序列和控制字符
pub fn clean_terminal_output(input: &str) -> String {
    let mut result = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    while let Some(&next) = chars.peek() {
                        chars.next();
                        if next.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
            c if c.is_control() && c != '\t' => {}
            _ => result.push(c),
        }
    }

    result
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// 按空白切分，最多 `max` 段，最后一段保留剩余内容（去首尾空白）
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut rest = line.trim();
    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(pos) => {
                fields.push(&rest[..pos]);
                rest = rest[pos..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

/// 若下一行缩进则作为描述，并推进行号
fn take_description(lines: &[&str], i: &mut usize) -> String {
    match lines.get(*i + 1) {
        Some(next) if is_indented(next) => {
            *i += 1;
            clean_terminal_output(next.trim())
        }
        _ => String::new(),
    }
}

/// 解析 `pacman -Ss` 的搜索输出
///
/// ```text
/// core/vim 2:9.1.0-1 [installed]
///     Vi Improved, a highly configurable, improved version of the vi text editor
/// ```
///
/// 安装状态由调用方另行查询，这里统一填 false。
pub fn parse_official_search(output: &str) -> Vec<PackageRecord> {
    let lines: Vec<&str> = output.lines().collect();
    let mut results = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !line.trim().is_empty() && !is_indented(line) {
            let fields = split_fields(line, 2);
            if fields.len() >= 2 {
                let name = fields[0];
                let version = fields[1];
                let description = take_description(&lines, &mut i);
                let (repository, pkg_name, source) = match name.split_once('/') {
                    Some((repo, pkg)) => (repo, pkg, Source::Official),
                    None => ("unknown", name, Source::Unknown),
                };
                results.push(PackageRecord {
                    name: name.to_string(),
                    pkg_name: pkg_name.to_string(),
                    version: version.to_string(),
                    description,
                    repository: repository.to_string(),
                    source,
                    is_installed: false,
                });
            }
        }
        i += 1;
    }

    results
}

/// 解析 AUR 助手（yay / paru）的 `-Ss` 输出
///
/// 记录行最多切三段：若首段恰为 `aur/`，包名取第二段，否则取首段；
/// 第三段作为描述。版本号留空，详情页再补。
pub fn parse_aur_search(output: &str) -> Vec<PackageRecord> {
    let mut results = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() || is_indented(line) {
            continue;
        }
        let fields = split_fields(line, 3);
        if fields.len() < 2 {
            continue;
        }
        let name = if fields[0] == AUR_PREFIX { fields[1] } else { fields[0] };
        let description = fields.get(2).copied().unwrap_or("");
        let pkg_name = name.strip_prefix(AUR_PREFIX).unwrap_or(name);
        results.push(PackageRecord {
            name: name.to_string(),
            pkg_name: pkg_name.to_string(),
            version: String::new(),
            description: clean_terminal_output(description),
            repository: "aur".to_string(),
            source: Source::Aur,
            is_installed: false,
        });
    }

    results
}

/// `pacman -Qs` 中的一条：包名与描述，版本由 `pacman -Q` 另查
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledHit {
    pub name: String,
    pub description: String,
}

/// 解析 `pacman -Qs` 的搜索输出
///
/// ```text
/// local/vim 9.1.0-1
///     Vi Improved, a highly configurable, improved version of the vi text editor
/// ```
pub fn parse_installed_search(output: &str) -> Vec<InstalledHit> {
    let lines: Vec<&str> = output.lines().collect();
    let mut results = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !line.trim().is_empty() && !is_indented(line) {
            let fields = split_fields(line, 2);
            if fields.len() >= 2 {
                let name = fields[0].rsplit('/').next().unwrap_or(fields[0]);
                let description = take_description(&lines, &mut i);
                results.push(InstalledHit {
                    name: name.to_string(),
                    description,
                });
            }
        }
        i += 1;
    }

    results
}

/// 解析 `pacman -Q <name>` 的单行输出，返回版本号
pub fn parse_query_version(output: &str) -> Option<String> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    let (_, version) = line.trim().split_once(char::is_whitespace)?;
    let version = version.trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// 解析 `pacman -Q` 的全部已安装包
pub fn parse_installed_list(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_fields(line, 2);
            if fields.len() < 2 {
                return None;
            }
            Some(PackageRecord {
                name: fields[0].to_string(),
                pkg_name: fields[0].to_string(),
                version: fields[1].to_string(),
                description: String::new(),
                repository: "installed".to_string(),
                source: Source::Installed,
                is_installed: true,
            })
        })
        .collect()
}

/// 解析 `pacman -Qi` / `-Si` 的 key:value 输出并写入 `details`
///
/// 只认识固定的几个键，其余键（包括将来新增的）一律忽略。
pub fn apply_key_values(output: &str, details: &mut PackageDetails) {
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "version" => details.version = value.to_string(),
            "repository" | "repo" => details.repository = value.to_string(),
            "installed size" => details.installed_size = value.to_string(),
            "license" => details.license = value.to_string(),
            "url" => details.url = value.to_string(),
            "description" => details.description = value.to_string(),
            "depends on" | "depends" => {
                details.dependencies = value
                    .split_whitespace()
                    .filter(|dep| *dep != "None")
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
}

/// 解析 `pactree` 输出：去掉空行，最多保留 `limit` 行
pub fn parse_tree_lines(output: &str, limit: usize) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// 解析 `pacman -Qu`：`name old -> new`
pub fn parse_pending_updates(output: &str) -> Vec<UpdateItem> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 4 && parts[2] == "->" {
                Some(UpdateItem {
                    name: parts[0].to_string(),
                    from_version: parts[1].to_string(),
                    to_version: parts[3].to_string(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// 解析 `pacman -Sl`：`repo name version [installed]`
pub fn parse_repo_listing(output: &str) -> RepoListing {
    let mut listing = RepoListing::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        listing
            .entry(parts[0].to_string())
            .or_default()
            .push(RepoPackage {
                name: parts[1].to_string(),
                installed: line.contains("[installed"),
            });
    }
    listing
}

// ========== 进度信息解析 ==========

/// 从原始输出行推测粗略进度
///
/// 只是提示，不是真实百分比；按固定顺序取第一个命中的关键词。
pub fn progress_hint(line: &str) -> Option<u8> {
    let lower = line.to_lowercase();
    if lower.contains("downloading") {
        Some(50)
    } else if lower.contains("installing") {
        Some(75)
    } else if lower.contains("removing") {
        Some(60)
    } else if lower.contains("loading") {
        Some(40)
    } else {
        None
    }
}

/// sudo 口令错误时的提示行
pub fn is_auth_failure(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("incorrect password") || lower.contains("sorry, try again")
}
