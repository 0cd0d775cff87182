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

//! Invocation of the external Nix programs as child processes.
//!
//! Arguments are always passed as a list; nothing goes through a shell.

use crate::util::environment::{EnvVar, Environment, HOME};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// A fully described child process: program, arguments, and the environment
/// overrides that apply to it alone.
#[derive(Debug, PartialEq, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Environment,
}

impl Invocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Environment::new(),
        }
    }

    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter()
            .for_each(|a| self.args.push(a.as_ref().to_string()));
        self
    }

    /// Sets the overrides applied to the child's environment.
    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &Vec<String> {
        &self.args
    }

    pub fn get_env(&self) -> &Environment {
        &self.env
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// Why a child process did not produce usable output.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, String),
    #[error("{0} exited with error code {1}: {2}")]
    ExitCode(String, i32, String),
    #[error("{0} terminated by signal")]
    Signal(String),
    #[error("{0} produced unexpected output: {1}")]
    Output(String, String),
}

/// Runs invocations and hands back their standard output.
pub trait Toolchain {
    fn run(&self, inv: &Invocation) -> Result<String, ToolError>;
}

/// [Toolchain] that spawns real processes.
#[derive(Debug, Default)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn run(&self, inv: &Invocation) -> Result<String, ToolError> {
        let mut cmd = Command::new(inv.get_program());
        cmd.args(inv.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        inv.get_env().apply(&mut cmd);

        let output = cmd
            .output()
            .map_err(|e| ToolError::Spawn(inv.get_program().to_string(), e.to_string()))?;
        match output.status.code() {
            Some(0) => String::from_utf8(output.stdout)
                .map_err(|e| ToolError::Output(inv.to_string(), e.to_string())),
            Some(num) => Err(ToolError::ExitCode(
                inv.to_string(),
                num,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            None => Err(ToolError::Signal(inv.to_string())),
        }
    }
}

/// An empty, throwaway home directory for a child process.
///
/// Keeps the user's VCS configuration out of the child; the directory is
/// removed when this value is dropped, whichever way the caller exits.
pub struct ScratchHome {
    dir: TempDir,
}

impl ScratchHome {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn get_path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Environment overrides pointing `HOME` at the scratch directory.
    pub fn to_env(&self) -> Environment {
        Environment::new().overwrite(EnvVar::with(HOME, &self.dir.path().to_string_lossy()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_quotes_arguments() {
        let inv = Invocation::new("nix-hash")
            .args(["--type", "sha256"])
            .arg("--to-base32");
        assert_eq!(inv.to_string(), "nix-hash \"--type\" \"sha256\" \"--to-base32\"");
    }

    #[test]
    fn scratch_home_is_removed_on_drop() {
        let home = ScratchHome::new().unwrap();
        let path = home.get_path().to_path_buf();
        assert_eq!(home.to_env().get(HOME).unwrap().get_value(), path.to_string_lossy());
        assert!(path.is_dir());
        drop(home);
        assert_eq!(path.exists(), false);
    }

    #[cfg(unix)]
    #[test]
    fn system_toolchain_captures_output() {
        let out = SystemToolchain
            .run(&Invocation::new("sh").args(["-c", "echo \"$HOME\""]).env(
                Environment::new().overwrite(EnvVar::with(HOME, "/nonexistent-home")),
            ))
            .unwrap();
        assert_eq!(out.trim(), "/nonexistent-home");

        let err = SystemToolchain
            .run(&Invocation::new("sh").args(["-c", "exit 3"]))
            .unwrap_err();
        assert!(matches!(err, ToolError::ExitCode(_, 3, _)));

        let err = SystemToolchain
            .run(&Invocation::new("gemnix-definitely-not-a-program"))
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn(_, _)));
    }
}
