//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use std::path::{Component, Path, PathBuf};

/// Turns `url` into a token that is safe to use as a single file name.
///
/// Every run of characters outside of `[A-Za-z0-9_-]` collapses into one `_`.
pub fn sanitize(url: &str) -> String {
    let mut token = String::with_capacity(url.len());
    let mut in_run = false;
    for c in url.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            token.push(c);
            in_run = false;
        } else if in_run == false {
            token.push('_');
            in_run = true;
        }
    }
    token
}

/// Resolves `path` against `root` when it is relative; absolute paths are
/// returned unchanged.
pub fn resolve_rel_path(root: &Path, path: &Path) -> PathBuf {
    match path.is_relative() {
        true => root.join(path),
        false => path.to_path_buf(),
    }
}

/// Expresses `path` relative to `base` in the `./<path>` form Nix expects for
/// path literals.
///
/// Both paths are compared lexically, so neither needs to exist on disk.
pub fn dot_relative(path: &Path, base: &Path) -> String {
    let path = normalize(path);
    let base = normalize(base);
    let common = path
        .components()
        .zip(base.components())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<String> = Vec::new();
    for _ in base.components().skip(common) {
        parts.push(String::from(".."));
    }
    for c in path.components().skip(common) {
        parts.push(c.as_os_str().to_string_lossy().to_string());
    }
    match parts.first().map(|s| s.as_str()) {
        None => String::from("./."),
        Some("..") => parts.join("/"),
        Some(_) => format!("./{}", parts.join("/")),
    }
}

/// Removes `.` components and folds `..` into its parent where possible.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => (),
            Component::ParentDir => {
                if result.pop() == false {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}
