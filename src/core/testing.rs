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

//! Test doubles for the network and the external Nix programs.

use crate::core::credentials::Credentials;
use crate::core::toolchain::{Invocation, ToolError, Toolchain};
use crate::core::transport::{FetchError, Transport};
use crate::util::sha256::{compute_sha256, Sha256Hash};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use url::Url;

/// Serves canned responses and records every request it receives.
pub struct FakeTransport {
    responses: HashMap<String, (u32, Vec<u8>)>,
    requests: RefCell<Vec<(String, Option<Credentials>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn respond(mut self, url: &str, code: u32, body: &[u8]) -> Self {
        self.responses.insert(url.to_string(), (code, body.to_vec()));
        self
    }

    pub fn count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<(String, Option<Credentials>)> {
        self.requests.borrow().clone()
    }
}

impl Transport for FakeTransport {
    fn download(
        &self,
        url: &Url,
        auth: Option<&Credentials>,
        dst: &mut dyn Write,
    ) -> Result<(), FetchError> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), auth.cloned()));
        let host = url.host_str().unwrap_or_default();
        match self.responses.get(url.as_str()) {
            Some((code, body)) => {
                // error pages still stream a body before the status is known
                dst.write_all(body)?;
                FetchError::check_status(host, *code)
            }
            None => Err(FetchError::Http(host.to_string(), 404)),
        }
    }
}

/// Stands in for `nix-prefetch-url`, `nix-hash` and `nix-prefetch-git`,
/// computing digests with the built-in SHA-256.
pub struct FakeNix {
    broken: bool,
    lying: bool,
    calls: RefCell<Vec<Invocation>>,
}

impl FakeNix {
    pub fn new() -> Self {
        Self {
            broken: false,
            lying: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Makes `nix-prefetch-url` exit with an error.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Makes `nix-prefetch-url` report a digest of different bytes.
    pub fn lying(mut self) -> Self {
        self.lying = true;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    fn fail(inv: &Invocation, reason: &str) -> ToolError {
        ToolError::ExitCode(inv.to_string(), 1, reason.to_string())
    }
}

impl Toolchain for FakeNix {
    fn run(&self, inv: &Invocation) -> Result<String, ToolError> {
        self.calls.borrow_mut().push(inv.clone());
        let args = inv.get_args();
        match inv.get_program() {
            "nix-prefetch-url" => {
                if self.broken == true {
                    return Err(Self::fail(inv, "error: store is read-only"));
                }
                let target = args.last().ok_or_else(|| Self::fail(inv, "missing url"))?;
                let path = target
                    .strip_prefix("file://")
                    .ok_or_else(|| Self::fail(inv, "only local files are expected"))?;
                let sum = match self.lying {
                    true => compute_sha256(b"something else entirely"),
                    false => Sha256Hash::from_file(std::path::Path::new(path))
                        .map_err(|e| Self::fail(inv, &e.to_string()))?,
                };
                Ok(format!("path is '/nix/store/fake-{}'\n{}\n", args[3], sum.to_nix_base32()))
            }
            "nix-hash" => {
                let token = args.last().ok_or_else(|| Self::fail(inv, "missing hash"))?;
                let sum = Sha256Hash::from_any(token).map_err(|e| Self::fail(inv, &e.to_string()))?;
                Ok(format!("{}\n", sum.to_nix_base32()))
            }
            "nix-prefetch-git" => {
                let pos = args.iter().position(|a| a == "--rev").unwrap_or(0);
                let rev = args.get(pos + 1).ok_or_else(|| Self::fail(inv, "missing rev"))?;
                let url = args.get(1).ok_or_else(|| Self::fail(inv, "missing url"))?;
                Ok(format!(
                    "Initialized empty Git repository\n{{\n  \"url\": \"{}\",\n  \"rev\": \"{}\",\n  \"date\": \"2020-01-01T00:00:00+00:00\",\n  \"sha256\": \"{}\",\n  \"fetchSubmodules\": true\n}}\n",
                    url,
                    rev,
                    compute_sha256(rev.as_bytes())
                ))
            }
            other => Err(ToolError::Spawn(other.to_string(), String::from("not found"))),
        }
    }
}
