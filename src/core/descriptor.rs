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

use serde_derive::Serialize;
use std::path::PathBuf;

/// Default branch assumed for git sources that name no branch, tag, or ref.
pub const DEFAULT_BRANCH: &str = "master";

/// The fetch instructions recorded for one dependency.
#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SourceDescriptor {
    /// A `.gem` file available from any of `remotes`.
    #[serde(rename = "gem")]
    Gem { remotes: Vec<String>, sha256: String },
    /// A commit fetched by Nix's builtin git fetcher, which checks the
    /// revision itself.
    #[serde(rename = "builtins-git")]
    BuiltinsGit {
        url: String,
        rev: String,
        #[serde(rename = "ref")]
        reference: String,
        submodules: bool,
    },
    /// A commit fetched as a fixed-output derivation.
    #[serde(rename = "git")]
    Git {
        url: String,
        rev: String,
        sha256: String,
        #[serde(rename = "fetchSubmodules")]
        fetch_submodules: bool,
    },
    #[serde(rename = "path")]
    Path { path: PathBuf },
}

impl SourceDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gem { .. } => "gem",
            Self::BuiltinsGit { .. } => "builtins-git",
            Self::Git { .. } => "git",
            Self::Path { .. } => "path",
        }
    }

    /// A short, human-readable summary used in diagnostics.
    pub fn summary(&self) -> String {
        match self {
            Self::Gem { sha256, .. } => sha256.clone(),
            Self::BuiltinsGit { rev, reference, .. } => format!("{} ({})", rev, reference),
            Self::Git { rev, sha256, .. } => format!("{} ({})", rev, sha256),
            Self::Path { path } => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialize_tags_kind() {
        let desc = SourceDescriptor::BuiltinsGit {
            url: String::from("https://example.test/beta.git"),
            rev: String::from("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"),
            reference: String::from("main"),
            submodules: false,
        };
        assert_eq!(desc.kind(), "builtins-git");
        assert_eq!(
            serde_json::to_string(&desc).unwrap(),
            r#"{"type":"builtins-git","url":"https://example.test/beta.git","rev":"deadbeefdeadbeefdeadbeefdeadbeefdeadbeef","ref":"main","submodules":false}"#
        );

        let desc = SourceDescriptor::Path {
            path: PathBuf::from("vendor/gems/local"),
        };
        assert_eq!(
            serde_json::to_string(&desc).unwrap(),
            r#"{"type":"path","path":"vendor/gems/local"}"#
        );
    }
}
