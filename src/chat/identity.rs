//! Who is at the keyboard.

use std::env;
use std::fs;

/// The operator's name, if one can be found.
///
/// `USERNAME` or `USER` supply a default; a `name = ...` entry in
/// `~/.gitconfig` takes precedence.
pub fn operator_name() -> Option<String> {
    let from_git = dirs::home_dir()
        .map(|home| home.join(".gitconfig"))
        .and_then(|path| fs::read_to_string(path).ok())
        .and_then(|contents| name_from_gitconfig(&contents));
    from_git
        .or_else(|| env::var("USERNAME").ok())
        .or_else(|| env::var("USER").ok())
        .filter(|name| !name.trim().is_empty())
}

/// The value of the first `name = ...` line of a git config file.
pub fn name_from_gitconfig(contents: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("name"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().to_string())
        .filter(|name| !name.is_empty())
}
