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

//! Retrieval of remote artifacts over HTTP(S).

use crate::core::credentials::Credentials;
use curl::easy::Easy;
use std::io::Write;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("gemnix/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0} responded with status code {1}")]
    Http(String, u32),
    #[error("{0} denied access with status code {1}")]
    Unauthorized(String, u32),
    #[error("transfer failed: {0}")]
    Transfer(#[from] curl::Error),
    #[error("failed to write downloaded bytes: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid url {0:?}: {1}")]
    BadUrl(String, url::ParseError),
}

impl FetchError {
    /// Categorizes a finished transfer's response code.
    pub fn check_status(host: &str, code: u32) -> Result<(), FetchError> {
        match code {
            // 0 is reported for protocols without status codes (file://)
            0 | 200..=299 => Ok(()),
            401 | 403 => Err(FetchError::Unauthorized(host.to_string(), code)),
            _ => Err(FetchError::Http(host.to_string(), code)),
        }
    }
}

/// Moves the body found at a url into a writer.
pub trait Transport {
    /// Performs a GET request for `url`, streaming the response body into
    /// `dst`. Basic authentication is attached when `auth` is provided; the
    /// url itself is expected to carry no userinfo.
    fn download(
        &self,
        url: &Url,
        auth: Option<&Credentials>,
        dst: &mut dyn Write,
    ) -> Result<(), FetchError>;
}

/// [Transport] backed by libcurl.
#[derive(Debug, Default)]
pub struct CurlTransport {
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, t: Option<Duration>) -> Self {
        self.connect_timeout = t;
        self
    }

    pub fn timeout(mut self, t: Option<Duration>) -> Self {
        self.timeout = t;
        self
    }
}

impl Transport for CurlTransport {
    fn download(
        &self,
        url: &Url,
        auth: Option<&Credentials>,
        dst: &mut dyn Write,
    ) -> Result<(), FetchError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut easy = Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.useragent(USER_AGENT)?;
        if let Some(creds) = auth {
            easy.username(creds.get_username())?;
            easy.password(creds.get_password().unwrap_or_default())?;
        }
        if let Some(t) = self.connect_timeout {
            easy.connect_timeout(t)?;
        }
        if let Some(t) = self.timeout {
            easy.timeout(t)?;
        }

        let mut write_err: Option<std::io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match dst.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    write_err = Some(e);
                    // a short count aborts the transfer
                    Ok(0)
                }
            })?;
            transfer.perform()
        };
        if let Some(e) = write_err {
            return Err(FetchError::Io(e));
        }
        performed?;
        FetchError::check_status(&host, easy.response_code()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_codes() {
        assert!(FetchError::check_status("example.test", 200).is_ok());
        assert!(FetchError::check_status("example.test", 0).is_ok());
        assert!(matches!(
            FetchError::check_status("example.test", 401),
            Err(FetchError::Unauthorized(_, 401))
        ));
        assert!(matches!(
            FetchError::check_status("example.test", 403),
            Err(FetchError::Unauthorized(_, 403))
        ));
        assert!(matches!(
            FetchError::check_status("example.test", 404),
            Err(FetchError::Http(_, 404))
        ));
    }

    #[test]
    fn local_file_through_curl() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("alpha-1.0.0.gem");
        std::fs::write(&src, b"alpha artifact").unwrap();
        let url = Url::from_file_path(&src).unwrap();
        let mut body = Vec::new();
        CurlTransport::new().download(&url, None, &mut body).unwrap();
        assert_eq!(body, b"alpha artifact");
    }
}
