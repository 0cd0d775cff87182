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

use crate::commands::helps::gemnix;
use crate::core::config::Config;
use crate::core::context::Context;
use crate::core::credentials::BundlerSettings;
use crate::core::fetcher::Fetcher;
use crate::core::gemset::{Gemset, GEMSET_FILE};
use crate::core::lockfile::{LockFile, LOCK_FILE};
use crate::core::shellnix::{ShellNix, DEFAULT_RUBY, SHELL_NIX_FILE};
use crate::core::source::Source;
use crate::core::toolchain::SystemToolchain;
use crate::core::transport::CurlTransport;
use crate::error::Error;
use crate::util::anyerror::{AnyError, Fault, Unresolved};
use crate::util::filesystem;
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cliproc::{cli, proc, stage::*};
use cliproc::{Arg, Cli, Command, Help};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const GEMFILE: &str = "Gemfile";
const GEMSET_JSON_FILE: &str = "gemset.json";

#[derive(Debug, PartialEq)]
pub enum ColorMode {
    Always,
    Never,
    Auto,
}

impl FromStr for ColorMode {
    type Err = AnyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "auto" => Ok(Self::Auto),
            _ => Err(AnyError(format!(
                "value must be 'always', 'never', or 'auto'"
            ))),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Gemnix {
    version: bool,
    json: bool,
    init: bool,
    keep_going: bool,
    verbose: bool,
    lockfile: Option<PathBuf>,
    gemfile: Option<PathBuf>,
    gemset: Option<PathBuf>,
    config: Option<PathBuf>,
    ruby: Option<String>,
    project: Option<String>,
}

impl Command for Gemnix {
    fn interpret(cli: &mut Cli<Memory>) -> cli::Result<Self> {
        cli.help(Help::with(gemnix::HELP))?;
        // need to set this coloring mode ASAP
        match cli
            .get(Arg::option("color").value("when"))?
            .unwrap_or(ColorMode::Auto)
        {
            ColorMode::Always => colored::control::set_override(true),
            ColorMode::Never => colored::control::set_override(false),
            ColorMode::Auto => (),
        }
        Ok(Gemnix {
            // flags
            version: cli.check(Arg::flag("version"))?,
            json: cli.check(Arg::flag("json"))?,
            init: cli.check(Arg::flag("init"))?,
            keep_going: cli.check(Arg::flag("keep-going"))?,
            verbose: cli.check(Arg::flag("verbose"))?,
            // options
            lockfile: cli.get(Arg::option("lockfile").value("path"))?,
            gemfile: cli.get(Arg::option("gemfile").value("path"))?,
            gemset: cli.get(Arg::option("gemset").value("path"))?,
            config: cli.get(Arg::option("config").value("path"))?,
            ruby: cli.get(Arg::option("ruby").value("attr"))?,
            project: cli.get(Arg::option("project").value("name"))?,
        })
    }

    fn execute(self) -> proc::Result {
        // prioritize version information
        if self.version == true {
            println!("gemnix {}", VERSION);
            return Ok(());
        }

        let root = std::env::current_dir()?;
        let context = Context::new()
            .root(root)
            .settings(self.config.as_ref())?
            .cache()?;

        self.run(&context)
    }
}

impl Gemnix {
    fn run(&self, c: &Context) -> Result<(), Fault> {
        let root = c.get_root();
        let config: &Config = c.get_config();

        let lockfile_path = self.get_lockfile(root);
        let gemset_path = self.get_gemset(root);
        let mut lock = LockFile::from_path(&lockfile_path)?;
        lock.attach_caches(&c.local_caches());
        lock.rebase_paths(
            lockfile_path.parent().unwrap_or(root),
            gemset_path.parent().unwrap_or(root),
        );

        let settings = BundlerSettings::load(root)?;
        let transport = CurlTransport::new()
            .connect_timeout(config.get_connect_timeout())
            .timeout(config.get_timeout());
        let tools = SystemToolchain;
        let fetcher = Fetcher::new(c.get_cache_path(), &transport, &tools, &settings)
            .commands(config.get_commands());
        let source = Source::new(&fetcher)
            .git_prefetch(config.is_git_prefetch())
            .verbose(self.verbose);

        let (gemset, failures) = Gemset::resolve(lock.inner(), &source, self.keep_going)?;

        // write whatever was resolved, even when some dependencies were skipped
        let contents = match self.json {
            true => gemset.to_json()?,
            false => gemset.to_nix(),
        };
        Self::write_atomic(&gemset_path, contents.as_bytes())?;
        println!(
            "info: wrote {} gems to {}",
            gemset.len(),
            filesystem::dot_relative(&gemset_path, root)
        );

        if self.init == true {
            self.create_shell_nix(root, &lockfile_path, &gemset_path)?;
        }

        match failures.is_empty() {
            true => Ok(()),
            false => Err(Unresolved(
                failures
                    .into_iter()
                    .map(|(name, e)| (name, e.to_string()))
                    .collect(),
            ))?,
        }
    }

    fn get_lockfile(&self, root: &Path) -> PathBuf {
        match &self.lockfile {
            Some(p) => filesystem::resolve_rel_path(root, p),
            None => root.join(LOCK_FILE),
        }
    }

    fn get_gemset(&self, root: &Path) -> PathBuf {
        match (&self.gemset, self.json) {
            (Some(p), _) => filesystem::resolve_rel_path(root, p),
            (None, true) => root.join(GEMSET_JSON_FILE),
            (None, false) => root.join(GEMSET_FILE),
        }
    }

    fn create_shell_nix(&self, root: &Path, lockfile: &Path, gemset: &Path) -> Result<(), Fault> {
        let project = match &self.project {
            Some(p) => p.clone(),
            None => root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or(String::from("project")),
        };
        let gemfile = match &self.gemfile {
            Some(p) => filesystem::resolve_rel_path(root, p),
            None => root.join(GEMFILE),
        };
        let shell = ShellNix::new(root, &project)
            .ruby(self.ruby.as_deref().unwrap_or(DEFAULT_RUBY))
            .gemfile(&gemfile)
            .lockfile(lockfile)
            .gemset(gemset);
        let path = root.join(SHELL_NIX_FILE);
        match shell.create(&path) {
            Ok(()) => {
                println!("info: created {}", filesystem::dot_relative(&path, root));
                Ok(())
            }
            Err(e) => match e.downcast_ref::<Error>() {
                Some(Error::FileExists(_)) => {
                    eprintln!("{} {}", "warning:".yellow(), e);
                    Ok(())
                }
                _ => Err(e),
            },
        }
    }

    /// Replaces the file at `path` in a single rename so readers never see a
    /// partial write.
    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Fault> {
        let dir = match path.parent() {
            Some(d) if d.as_os_str().is_empty() == false => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(contents)?;
        file.persist(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_mode_from_str() {
        assert_eq!(ColorMode::from_str("always"), Ok(ColorMode::Always));
        assert_eq!(ColorMode::from_str("never"), Ok(ColorMode::Never));
        assert_eq!(ColorMode::from_str("auto"), Ok(ColorMode::Auto));
        assert!(ColorMode::from_str("sometimes").is_err());
    }

    fn blank() -> Gemnix {
        Gemnix {
            version: false,
            json: false,
            init: false,
            keep_going: false,
            verbose: false,
            lockfile: None,
            gemfile: None,
            gemset: None,
            config: None,
            ruby: None,
            project: None,
        }
    }

    #[test]
    fn default_paths() {
        let root = Path::new("/work/app");
        let cmd = blank();
        assert_eq!(cmd.get_lockfile(root), PathBuf::from("/work/app/Gemfile.lock"));
        assert_eq!(cmd.get_gemset(root), PathBuf::from("/work/app/gemset.nix"));

        let mut cmd = blank();
        cmd.json = true;
        assert_eq!(cmd.get_gemset(root), PathBuf::from("/work/app/gemset.json"));

        cmd.gemset = Some(PathBuf::from("nix/gems.json"));
        cmd.lockfile = Some(PathBuf::from("/elsewhere/Gemfile.lock"));
        assert_eq!(cmd.get_gemset(root), PathBuf::from("/work/app/nix/gems.json"));
        assert_eq!(cmd.get_lockfile(root), PathBuf::from("/elsewhere/Gemfile.lock"));
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GEMSET_FILE);
        std::fs::write(&path, "old").unwrap();
        Gemnix::write_atomic(&path, b"{ }\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ }\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn shell_nix_left_alone_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let shell = dir.path().join(SHELL_NIX_FILE);
        std::fs::write(&shell, "# mine\n").unwrap();
        let mut cmd = blank();
        cmd.project = Some(String::from("app"));
        cmd.create_shell_nix(
            dir.path(),
            &dir.path().join(LOCK_FILE),
            &dir.path().join(GEMSET_FILE),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&shell).unwrap(), "# mine\n");
    }

    #[test]
    fn shell_nix_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = blank();
        cmd.project = Some(String::from("app"));
        cmd.ruby = Some(String::from("ruby_3_3"));
        cmd.create_shell_nix(
            dir.path(),
            &dir.path().join(LOCK_FILE),
            &dir.path().join(GEMSET_FILE),
        )
        .unwrap();
        let text = std::fs::read_to_string(dir.path().join(SHELL_NIX_FILE)).unwrap();
        assert!(text.contains("name = \"app-bundler-env\";"));
        assert!(text.contains("ruby = ruby_3_3;"));
        assert!(text.contains("gemset   = ./gemset.nix;"));
    }
}
