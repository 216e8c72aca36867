//! 输入行 -> 意图

use crate::package_manager::Source;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Search { keyword: String, source: Source },
    Info { name: String, source: Source, dependencies: bool },
    Install { names: Vec<String>, source: Source },
    Reinstall { name: String, source: Source },
    Remove { names: Vec<String> },
    InstallLocal { path: PathBuf },
    SystemUpdate,
    CleanCache,
    FixDependencies,
    RemoveOrphans,
    ScanUpdates,
    /// 为空时应用上次扫描到的全部更新
    ApplyUpdates { names: Vec<String> },
    Repositories,
    Installed,
    ExportDetails,
    ExportRepositories,
    Login,
    Logout,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("'{command}' needs {what}")]
    MissingArgument { command: &'static str, what: &'static str },
    #[error("AUR packages are installed one at a time")]
    AurBatch,
}

pub const HELP: &str = "\
commands:
  search [official|aur|installed] <keyword>   search packages
  info [--deps] [official|aur|installed] <name>  show package details
  install [aur] <name>...                      install packages
  reinstall [aur] <name>                       reinstall a package
  remove <name>...                             remove packages
  local <file>                                 install a local package file
  update                                       full system update
  updates                                      list pending updates
  apply [<name>...]                            apply pending updates
  clean                                        clean the package cache
  fix                                          refresh databases, clear stale lock
  orphans                                      remove orphaned packages
  repos                                        list repositories
  installed                                    list installed packages
  export-details                               save the last shown details
  export-repos                                 save the last repository listing
  login / logout                               set or forget the sudo password
  help / quit";

/// 可选的来源前缀：只有后面还有参数时才当作来源
fn take_source<'a>(args: &'a [&'a str], default: Source) -> (Source, &'a [&'a str]) {
    match args.split_first() {
        Some((first, rest)) if !rest.is_empty() => match Source::from_tag(first) {
            Some(source) => (source, rest),
            None => (default, args),
        },
        _ => (default, args),
    }
}

fn names(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

pub fn parse(line: &str) -> Result<Option<Intent>, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((command, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let intent = match command.to_ascii_lowercase().as_str() {
        "search" | "s" => {
            let (source, rest) = take_source(args, Source::Official);
            if rest.is_empty() {
                return Err(CommandError::MissingArgument { command: "search", what: "a keyword" });
            }
            Intent::Search { keyword: rest.join(" "), source }
        }
        "info" | "i" => {
            let (dependencies, args) = match args.split_first() {
                Some((&"--deps", rest)) => (true, rest),
                _ => (false, args),
            };
            let (source, rest) = take_source(args, Source::Official);
            let [name] = rest else {
                return Err(CommandError::MissingArgument { command: "info", what: "one package name" });
            };
            Intent::Info { name: name.to_string(), source, dependencies }
        }
        "install" => {
            let (source, rest) = take_source(args, Source::Official);
            if rest.is_empty() {
                return Err(CommandError::MissingArgument { command: "install", what: "a package name" });
            }
            if source == Source::Aur && rest.len() > 1 {
                return Err(CommandError::AurBatch);
            }
            Intent::Install { names: names(rest), source }
        }
        "reinstall" => {
            let (source, rest) = take_source(args, Source::Official);
            let [name] = rest else {
                return Err(CommandError::MissingArgument { command: "reinstall", what: "one package name" });
            };
            Intent::Reinstall { name: name.to_string(), source }
        }
        "remove" | "rm" => {
            if args.is_empty() {
                return Err(CommandError::MissingArgument { command: "remove", what: "a package name" });
            }
            Intent::Remove { names: names(args) }
        }
        "local" => {
            if args.is_empty() {
                return Err(CommandError::MissingArgument { command: "local", what: "a package file" });
            }
            Intent::InstallLocal { path: PathBuf::from(args.join(" ")) }
        }
        "update" => Intent::SystemUpdate,
        "updates" => Intent::ScanUpdates,
        "apply" => Intent::ApplyUpdates { names: names(args) },
        "clean" => Intent::CleanCache,
        "fix" => Intent::FixDependencies,
        "orphans" => Intent::RemoveOrphans,
        "repos" => Intent::Repositories,
        "installed" => Intent::Installed,
        "export-details" => Intent::ExportDetails,
        "export-repos" => Intent::ExportRepositories,
        "login" => Intent::Login,
        "logout" => Intent::Logout,
        "help" | "?" => Intent::Help,
        "quit" | "exit" | "q" => Intent::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(intent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_with_and_without_source() {
        assert_eq!(
            parse("search vim").unwrap(),
            Some(Intent::Search { keyword: "vim".to_string(), source: Source::Official })
        );
        assert_eq!(
            parse("search aur yay bin").unwrap(),
            Some(Intent::Search { keyword: "yay bin".to_string(), source: Source::Aur })
        );
        // 只有一个参数时 "aur" 是关键词
        assert_eq!(
            parse("search aur").unwrap(),
            Some(Intent::Search { keyword: "aur".to_string(), source: Source::Official })
        );
    }

    #[test]
    fn info_flags() {
        assert_eq!(
            parse("info --deps installed vim").unwrap(),
            Some(Intent::Info { name: "vim".to_string(), source: Source::Installed, dependencies: true })
        );
        assert!(matches!(parse("info"), Err(CommandError::MissingArgument { .. })));
    }

    #[test]
    fn install_rules() {
        assert_eq!(
            parse("install vim git").unwrap(),
            Some(Intent::Install { names: vec!["vim".to_string(), "git".to_string()], source: Source::Official })
        );
        assert_eq!(parse("install aur a b"), Err(CommandError::AurBatch));
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("frobnicate"), Err(CommandError::Unknown("frobnicate".to_string())));
        assert_eq!(parse("QUIT").unwrap(), Some(Intent::Quit));
    }
}
