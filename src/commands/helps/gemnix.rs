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

pub const HELP: &str = r#"Convert a Bundler lockfile into a Nix gemset.

Usage:
    gemnix [options]

Options:
    --lockfile <path>   lockfile to read (default: Gemfile.lock)
    --gemfile <path>    Gemfile referenced by shell.nix (default: Gemfile)
    --gemset <path>     file to write (default: gemset.nix)
    --config <path>     configuration file (default: gemnix.toml)
    --json              write the gemset as json
    --init              also create a shell.nix if one does not exist
    --ruby <attr>       ruby attribute used by shell.nix (default: ruby)
    --project <name>    project name used by shell.nix
    --keep-going        skip dependencies that cannot be resolved
    --verbose           print each resolved dependency
    --color <when>      coloring: auto, always, never
    --version           print version information and exit
    --help, -h          print help information"#;
