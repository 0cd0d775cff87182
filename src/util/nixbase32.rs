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

//! The base-32 dialect Nix uses for store paths and fixed-output hashes.
//!
//! It differs from RFC 4648: the alphabet omits `e`, `o`, `t` and `u`, and
//! the bytes are consumed from the end of the input.

const ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Number of characters needed to encode `len` bytes.
pub fn encoded_len(len: usize) -> usize {
    match len {
        0 => 0,
        _ => (len * 8 - 1) / 5 + 1,
    }
}

pub fn encode(bytes: &[u8]) -> String {
    let len = encoded_len(bytes.len());
    let mut out = String::with_capacity(len);
    for n in (0..len).rev() {
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;
        let hi = match bytes.get(i + 1) {
            Some(next) => (*next as u16) << (8 - j),
            None => 0,
        };
        let c = ((bytes[i] as u16 >> j) | hi) & 0x1f;
        out.push(ALPHABET[c as usize] as char);
    }
    out
}

/// Decodes `s`, returning the first character that is not part of the
/// alphabet (or that overflows the output) as the error.
pub fn decode(s: &str) -> Result<Vec<u8>, char> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = vec![0u8; chars.len() * 5 / 8];
    for (n, c) in chars.iter().rev().enumerate() {
        let digit = match ALPHABET.iter().position(|a| *a as char == *c) {
            Some(d) => d as u16,
            None => return Err(*c),
        };
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;
        if i < out.len() {
            out[i] |= (digit << j) as u8;
        } else if digit != 0 {
            return Err(*c);
        }
        let carry = (digit >> (8 - j)) as u8;
        if i + 1 < out.len() {
            out[i + 1] |= carry;
        } else if carry != 0 {
            return Err(*c);
        }
    }
    Ok(out)
}

/// Checks if `s` looks like a base-32 encoded SHA-256 digest.
pub fn is_sha256(s: &str) -> bool {
    s.len() == encoded_len(32) && s.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::sha256::compute_sha256;

    #[test]
    fn known_digests() {
        assert_eq!(
            encode(compute_sha256(&[]).as_bytes()),
            "0mdqa9w1p6cmli6976v4wi0sw9r4p5prkj7lzfd1877wk11c9c73"
        );
        assert_eq!(
            encode(compute_sha256("hello world".as_bytes()).as_bytes()),
            "1sfdxziarxw8j3p80lvswgpq9i7smdyxmmsj5sjhhgjdjfwjfkdr"
        );
    }

    #[test]
    fn decode_restores_bytes() {
        let sum = compute_sha256("alpha artifact".as_bytes());
        let text = encode(sum.as_bytes());
        assert_eq!(text, "0nsj2bnc1yv5zk1ma4rl2nbvj501s3abh9icr8bqjcwkdk4idrk3");
        assert_eq!(decode(&text).unwrap(), sum.as_bytes().to_vec());
    }

    #[test]
    fn rejects_foreign_characters() {
        // 'e' is not part of the alphabet
        assert_eq!(decode("0e"), Err('e'));
        assert_eq!(is_sha256("0mdqa9w1p6cmli6976v4wi0sw9r4p5prkj7lzfd1877wk11c9c73"), true);
        assert_eq!(is_sha256("0mdqa9w1p6cmli6976v4wi0sw9r4p5prkj7lzfd1877wk11c9c7"), false);
        assert_eq!(is_sha256("0mdqa9w1p6cmli6976v4wi0sw9r4p5prkj7lzfd1877wk11c9c7u"), false);
    }
}
