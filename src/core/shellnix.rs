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

//! Scaffolds a `shell.nix` that builds a `bundlerEnv` from the gemset.

use crate::error::Error;
use crate::util::anyerror::Fault;
use crate::util::filesystem;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SHELL_NIX_FILE: &str = "shell.nix";

pub const DEFAULT_RUBY: &str = "ruby";

const TEMPLATE: &str = r#"with (import <nixpkgs> {});
let
  env = bundlerEnv {
    name = "{{ gemnix.project }}-bundler-env";
    ruby = {{ gemnix.ruby }};
    gemfile  = {{ gemnix.gemfile }};
    lockfile = {{ gemnix.lockfile }};
    gemset   = {{ gemnix.gemset }};
  };
in stdenv.mkDerivation {
  name = "{{ gemnix.project }}";
  buildInputs = [ env ];
}
"#;

type VarLUT = HashMap<String, String>;

#[derive(Debug, PartialEq)]
pub struct ShellNix {
    root: PathBuf,
    project: String,
    ruby: String,
    gemfile: PathBuf,
    lockfile: PathBuf,
    gemset: PathBuf,
}

impl ShellNix {
    /// Creates a scaffold for the project at `root`, where `shell.nix` will
    /// live. Relative file paths are taken from `root`.
    pub fn new(root: &Path, project: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            project: project.to_string(),
            ruby: DEFAULT_RUBY.to_string(),
            gemfile: PathBuf::from("Gemfile"),
            lockfile: PathBuf::from("Gemfile.lock"),
            gemset: PathBuf::from("gemset.nix"),
        }
    }

    pub fn ruby(mut self, attr: &str) -> Self {
        self.ruby = attr.to_string();
        self
    }

    pub fn gemfile(mut self, path: &Path) -> Self {
        self.gemfile = path.to_path_buf();
        self
    }

    pub fn lockfile(mut self, path: &Path) -> Self {
        self.lockfile = path.to_path_buf();
        self
    }

    pub fn gemset(mut self, path: &Path) -> Self {
        self.gemset = path.to_path_buf();
        self
    }

    fn path_for(&self, path: &Path) -> String {
        filesystem::dot_relative(&filesystem::resolve_rel_path(&self.root, path), &self.root)
    }

    fn to_code(&self) -> VarLUT {
        let mut code = VarLUT::new();
        code.insert("gemnix.project".to_string(), self.project.clone());
        code.insert("gemnix.ruby".to_string(), self.ruby.clone());
        code.insert("gemnix.gemfile".to_string(), self.path_for(&self.gemfile));
        code.insert("gemnix.lockfile".to_string(), self.path_for(&self.lockfile));
        code.insert("gemnix.gemset".to_string(), self.path_for(&self.gemset));
        code
    }

    pub fn render(&self) -> String {
        substitute(TEMPLATE, &self.to_code())
    }

    /// Writes the rendered file to `path`, leaving any existing file alone.
    pub fn create(&self, path: &Path) -> Result<(), Fault> {
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::FileExists(path.to_path_buf()))?
            }
            Err(e) => return Err(e)?,
        };
        file.write_all(self.render().as_bytes())?;
        Ok(())
    }
}

const L_VAR_DELIMITER: char = '{';
const R_VAR_DELIMITER: char = '}';

/// Replaces each `{{ key }}` in `text` with its value from `code`. Unknown
/// keys and lone braces are kept as written.
fn substitute(text: &str, code: &VarLUT) -> String {
    let mut result = String::new();

    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            L_VAR_DELIMITER => match gather_variable(&mut chars, c, R_VAR_DELIMITER) {
                Ok(r) => {
                    // remove delimiters and surrounding whitespace to get key name
                    let key = r[2..r.len() - 2].trim();
                    match code.get(key) {
                        Some(value) => result.push_str(value),
                        None => result.push_str(&r),
                    }
                }
                Err(e) => result.push_str(&e),
            },
            _ => result.push(c),
        }
    }
    result
}

/// Builds a variable following the syntax `c0c0*c_nc_n`.
///
/// Assumes the first token was already consumed and is passed as `c0`.
fn gather_variable<T: Iterator<Item = char>>(
    chars: &mut T,
    c0: char,
    c_n: char,
) -> Result<String, String> {
    let mut var = String::from(c0);
    match chars.next() {
        Some(c) if c == c0 => var.push(c),
        Some(c) => {
            var.push(c);
            return Err(var);
        }
        None => return Err(var),
    }
    let mut last: Option<char> = None;
    while let Some(c) = chars.next() {
        var.push(c);
        if c == c_n && last == Some(c_n) {
            return Ok(var);
        }
        last = Some(c);
    }
    // never was able to close the variable
    Err(var)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render_relative_paths() {
        let root = Path::new("/work/app");
        let shell = ShellNix::new(root, "app")
            .ruby("ruby_3_2")
            .lockfile(Path::new("/work/app/ruby/Gemfile.lock"))
            .gemset(Path::new("nix/../gemset.nix"));
        let expected = r#"with (import <nixpkgs> {});
let
  env = bundlerEnv {
    name = "app-bundler-env";
    ruby = ruby_3_2;
    gemfile  = ./Gemfile;
    lockfile = ./ruby/Gemfile.lock;
    gemset   = ./gemset.nix;
  };
in stdenv.mkDerivation {
  name = "app";
  buildInputs = [ env ];
}
"#;
        assert_eq!(shell.render(), expected);
    }

    #[test]
    fn substitute_keeps_unknown_and_braces() {
        let mut code = VarLUT::new();
        code.insert("gemnix.project".to_string(), "app".to_string());
        assert_eq!(
            substitute("{ a = {}; b = {{ gemnix.project }}; c = {{ x }}; }", &code),
            "{ a = {}; b = app; c = {{ x }}; }"
        );
        assert_eq!(substitute("tail {{ open", &code), "tail {{ open");
    }

    #[test]
    fn create_only_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SHELL_NIX_FILE);
        let shell = ShellNix::new(dir.path(), "app");
        shell.create(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), shell.render());

        std::fs::write(&path, "# edited\n").unwrap();
        let err = shell.create(&path).unwrap_err();
        assert_eq!(err.to_string(), Error::FileExists(path.clone()).to_string());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
    }
}
