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

use colored::Colorize;
use std::{fmt::Display, path::PathBuf};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("couldn't fetch hash for {0}-{1}{2}")]
    GemHashNotFound(String, String, Hint),
    #[error("git source for {0}-{1} is missing required field {2:?}")]
    MissingGitField(String, String, &'static str),
    #[error("git source for {0}-{1} uses ambiguous ref {2:?}{3}")]
    AmbiguousGitRef(String, String, String, Hint),
    #[error("unknown bundler source {2:?} for {0}-{1}")]
    UnknownSource(String, String, String),
    #[error("failed to prefetch git repository {0} at {1}: {2}")]
    GitPrefetchFailed(String, String, LastError),
    #[error("failed to convert digest {0:?} to base-32: {1}")]
    DigestFormat(String, LastError),
    #[error("invalid lockfile syntax on line {0}: {1:?}")]
    LockfileSyntax(usize, String),
    #[error("failed to read lockfile {0:?}: {1}")]
    LockfileUnreadable(PathBuf, LastError),
    #[error("failed to parse configuration {0:?}: {1}")]
    ConfigInvalid(PathBuf, LastError),
    #[error("failed to read bundler settings {0:?}: {1}")]
    SettingsInvalid(PathBuf, LastError),
    #[error("failed to prepare cache directory {0:?}: {1}")]
    CacheUnavailable(PathBuf, LastError),
    #[error("refusing to overwrite existing file {0:?}")]
    FileExists(PathBuf),
}

#[derive(Debug, PartialEq)]
pub struct LastError(pub String);

impl Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Error::lowerize(self.0.to_string()))
    }
}

impl Error {
    pub fn lowerize(s: String) -> String {
        // get the first word
        let first_word = match s.split_whitespace().next() {
            Some(w) => w,
            None => return s,
        };
        // retain punctuation if the first word is all-caps and longer than 1 character
        if first_word.len() > 1
            && first_word
                .chars()
                .find(|c| c.is_ascii_lowercase() == true)
                .is_none()
        {
            s.to_string()
        } else {
            s.char_indices()
                .map(|(i, c)| if i == 0 { c.to_ascii_lowercase() } else { c })
                .collect()
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Hint {
    GitRefFullSha,
    CheckRemotes,
}

impl Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::GitRefFullSha => {
                "provide a 40 character SHA1 as 'ref' in the Gemfile; use 'tag' or 'branch' for names (see https://bundler.io/guides/git.html)"
            }
            Self::CheckRemotes => {
                "verify the gem is published on one of the lockfile's remotes or present in vendor/cache"
            }
        };
        write!(
            f,
            "\n\n{}: {}",
            "hint".green(),
            Error::lowerize(message.to_string())
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowerize_first_letter() {
        assert_eq!(Error::lowerize(String::from("Exited badly")), "exited badly");
        assert_eq!(Error::lowerize(String::from("HTTP 404")), "HTTP 404");
        assert_eq!(Error::lowerize(String::new()), "");
    }

    #[test]
    fn hash_error_names_package_and_version() {
        colored::control::set_override(false);
        let err = Error::GemHashNotFound(String::from("alpha"), String::from("1.0.0"), Hint::CheckRemotes);
        assert!(err.to_string().starts_with("couldn't fetch hash for alpha-1.0.0"));
    }
}
