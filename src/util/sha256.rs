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

//! Implements the SHA-256 algorithm (found under the SHA-2 group).
//!
//! The hasher is incremental so artifacts can be digested straight from disk
//! without buffering the entire file in memory.

use crate::util::nixbase32;
use std::fmt::Display;
use std::io::Read;
use std::num::ParseIntError;
use std::path::Path;
use std::str::FromStr;

/// Number of bytes in a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

const BLOCK_LEN: usize = 64;

const INIT: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const ROUNDS: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Sha256Hash {
    digest: [u8; DIGEST_LEN],
}

impl Sha256Hash {
    /// Creates a new hash filled with `digest`.
    pub fn from_bytes(digest: [u8; DIGEST_LEN]) -> Self {
        Self { digest: digest }
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Renders the digest in the base-32 alphabet used by Nix store hashes.
    pub fn to_nix_base32(&self) -> String {
        nixbase32::encode(&self.digest)
    }

    /// Parses a digest written either as 64 hexadecimal digits or as 52 Nix
    /// base-32 characters.
    pub fn from_any(s: &str) -> Result<Self, Sha256Error> {
        match s.len() {
            64 => Self::from_str(s),
            52 => {
                let bytes = nixbase32::decode(s).map_err(|c| Sha256Error::InvalidBase32(c))?;
                let mut digest = [0; DIGEST_LEN];
                digest.copy_from_slice(&bytes);
                Ok(Self { digest: digest })
            }
            l => Err(Sha256Error::BadLen(l)),
        }
    }

    /// Digests the file at `path` without reading it into memory all at once.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }
}

impl FromStr for Sha256Hash {
    type Err = Sha256Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(Sha256Error::BadLen(s.len()));
        }
        // byte offsets below are only char boundaries for ascii text
        if let Some(c) = s.chars().find(|c| c.is_ascii() == false) {
            return Err(Sha256Error::NonAscii(c));
        }
        let mut digest = [0; DIGEST_LEN];
        for i in 0..DIGEST_LEN {
            digest[i] = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)?;
        }
        Ok(Sha256Hash { digest: digest })
    }
}

impl Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Ok(for byte in self.digest {
            write!(f, "{:02x}", byte)?
        })
    }
}

/// Incremental SHA-256 hasher.
pub struct Sha256 {
    state: [u32; 8],
    block: [u8; BLOCK_LEN],
    filled: usize,
    length: u64,
}

impl Sha256 {
    pub fn new() -> Self {
        Self {
            state: INIT,
            block: [0; BLOCK_LEN],
            filled: 0,
            length: 0,
        }
    }

    /// Feeds more bytes into the running digest.
    pub fn update(&mut self, mut data: &[u8]) {
        self.length = self.length.wrapping_add(data.len() as u64);
        while data.is_empty() == false {
            let take = (BLOCK_LEN - self.filled).min(data.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&data[..take]);
            self.filled += take;
            data = &data[take..];
            if self.filled == BLOCK_LEN {
                compress(&mut self.state, &self.block);
                self.filled = 0;
            }
        }
    }

    /// Applies the final padding and produces the digest (big-endian).
    pub fn finalize(mut self) -> Sha256Hash {
        let bit_length = self.length.wrapping_mul(8);
        // append a single '1' as 1000 0000 (0x80)
        self.update(&[0x80]);
        // pad with zeros until there is exactly enough room for the length
        while self.filled != BLOCK_LEN - 8 {
            self.update(&[0x00]);
        }
        self.update(&bit_length.to_be_bytes());

        let mut digest = [0; DIGEST_LEN];
        for (i, word) in self.state.iter().enumerate() {
            digest[4 * i..4 * i + 4].copy_from_slice(&word.to_be_bytes());
        }
        Sha256Hash { digest: digest }
    }
}

/// Runs the compression function over one 512-bit chunk.
fn compress(state: &mut [u32; 8], chunk: &[u8; BLOCK_LEN]) {
    // create 64-entry message schedule array w[0..63] of 32-bit words
    let mut message: [u32; 64] = [0; 64];
    for j in 0..16 {
        message[j] = u32::from_be_bytes([chunk[4 * j], chunk[4 * j + 1], chunk[4 * j + 2], chunk[4 * j + 3]]);
    }
    // extend the first 16 words into the remaining 48 words w[16..63] of the message
    for j in 16..64 {
        let s0 = message[j - 15].rotate_right(7) ^ message[j - 15].rotate_right(18) ^ (message[j - 15] >> 3);
        let s1 = message[j - 2].rotate_right(17) ^ message[j - 2].rotate_right(19) ^ (message[j - 2] >> 10);
        message[j] = message[j - 16]
            .wrapping_add(s0)
            .wrapping_add(message[j - 7])
            .wrapping_add(s1);
    }

    let mut wh = *state;
    for i in 0..64 {
        let s1 = wh[4].rotate_right(6) ^ wh[4].rotate_right(11) ^ wh[4].rotate_right(25);
        let ch = (wh[4] & wh[5]) ^ ((!wh[4]) & wh[6]);
        let temp1 = wh[7]
            .wrapping_add(s1)
            .wrapping_add(ch)
            .wrapping_add(ROUNDS[i])
            .wrapping_add(message[i]);
        let s0 = wh[0].rotate_right(2) ^ wh[0].rotate_right(13) ^ wh[0].rotate_right(22);
        let maj = (wh[0] & wh[1]) ^ (wh[0] & wh[2]) ^ (wh[1] & wh[2]);
        let temp2 = s0.wrapping_add(maj);

        wh[7] = wh[6];
        wh[6] = wh[5];
        wh[5] = wh[4];
        wh[4] = wh[3].wrapping_add(temp1);
        wh[3] = wh[2];
        wh[2] = wh[1];
        wh[1] = wh[0];
        wh[0] = temp1.wrapping_add(temp2);
    }
    // add the compressed chunk to the current hash value
    for i in 0..8 {
        state[i] = state[i].wrapping_add(wh[i]);
    }
}

/// Compute the SHA-256 hash function for a slice of bytes.
pub fn compute_sha256(s: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(s);
    hasher.finalize()
}

#[derive(Debug, PartialEq)]
pub enum Sha256Error {
    BadLen(usize),
    InvalidDigit(ParseIntError),
    InvalidBase32(char),
    NonAscii(char),
}

impl std::error::Error for Sha256Error {}

impl Display for Sha256Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadLen(l) => write!(f, "invalid length {}; expecting 64 or 52", l),
            Self::InvalidDigit(c) => write!(f, "invalid hexadecimal digit {}", c),
            Self::InvalidBase32(c) => write!(f, "invalid base-32 character {:?}", c),
            Self::NonAscii(c) => write!(f, "invalid character {:?} in digest", c),
        }
    }
}

impl From<ParseIntError> for Sha256Error {
    fn from(e: ParseIntError) -> Self {
        Self::InvalidDigit(e)
    }
}
