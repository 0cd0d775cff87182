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

use std::error::Error;
use std::fmt::Display;

/// Quickly implement a custom/unique error message.
///
/// Can also be used to wrap an error's message.
#[derive(Debug, PartialEq)]
pub struct AnyError(pub String);

impl Error for AnyError {}

impl Display for AnyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Fault> for AnyError {
    fn from(value: Fault) -> Self {
        AnyError(value.to_string())
    }
}

impl From<&str> for AnyError {
    fn from(value: &str) -> Self {
        AnyError(value.to_string())
    }
}

pub type Fault = Box<dyn Error>;

/// Collects the failures of a run that was allowed to keep going past
/// unresolved dependencies.
#[derive(Debug, PartialEq)]
pub struct Unresolved(pub Vec<(String, String)>);

impl Error for Unresolved {}

impl Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to resolve {} dependencies:", self.0.len())?;
        for (name, reason) in &self.0 {
            write!(f, "\n    {}: {}", name, reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unresolved_lists_every_failure() {
        let err = Unresolved(vec![
            ("alpha".to_string(), "no digest".to_string()),
            ("beta".to_string(), "missing revision".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "failed to resolve 2 dependencies:\n    alpha: no digest\n    beta: missing revision"
        );
    }
}
