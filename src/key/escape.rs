//! Order-preserving escape codec
//!
//! Variable-length names are escaped so they can be concatenated after a
//! fixed key header and still sort like the original byte strings:
//!
//! ```text
//!   0x00..=0x23  ->  '#' hi lo
//!   0x24..=0x7d  ->  literal
//!   0x7e..=0xff  ->  '~' hi lo
//!   end          ->  '!'
//! ```
//!
//! `'!'` (0x21) sorts below `'#'` (0x23), which sorts below every literal,
//! which sorts below `'~'` (0x7e). Hex digits are lowercase so escaped bytes
//! keep their relative order. An encoding is never a prefix of another.

use crate::error::{KvsError, Result};

/// Terminates every escaped field
pub const TERMINATOR: u8 = b'!';

/// Escape marker for bytes at or below `'#'`
pub const LOW_ESCAPE: u8 = b'#';

/// Escape marker for bytes at or above `'~'`
pub const HIGH_ESCAPE: u8 = b'~';

/// Object key sorts before the name
pub const MARKER_LESS: u8 = b'<';

/// No object key (or the key equals the name)
pub const MARKER_EQUAL: u8 = b'=';

/// Object key sorts after the name
pub const MARKER_GREATER: u8 = b'>';

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Escape `input` and append it, terminator included, to `out`
pub fn append_escaped(input: &[u8], out: &mut Vec<u8>) {
    for &b in input {
        if b <= LOW_ESCAPE || b >= HIGH_ESCAPE {
            out.push(if b <= LOW_ESCAPE { LOW_ESCAPE } else { HIGH_ESCAPE });
            out.push(HEX_DIGITS[(b >> 4) as usize]);
            out.push(HEX_DIGITS[(b & 0x0f) as usize]);
        } else {
            out.push(b);
        }
    }
    out.push(TERMINATOR);
}

/// Escape a single byte string
pub fn encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + 1);
    append_escaped(input, &mut out);
    out
}

/// Length of `encode(input)` without building it
pub fn escaped_len(input: &[u8]) -> usize {
    input
        .iter()
        .map(|&b| if b <= LOW_ESCAPE || b >= HIGH_ESCAPE { 3 } else { 1 })
        .sum::<usize>()
        + 1
}

/// Decode one escaped field from the front of `input`
///
/// Returns the original bytes and the number of input bytes consumed,
/// terminator included.
pub fn decode_escaped(input: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        match input[pos] {
            TERMINATOR => return Ok((out, pos + 1)),
            LOW_ESCAPE | HIGH_ESCAPE => {
                let digits = input.get(pos + 1..pos + 3).ok_or_else(|| {
                    KvsError::Escape(format!("truncated escape at byte {}", pos))
                })?;
                let mut byte = [0u8; 1];
                hex::decode_to_slice(digits, &mut byte).map_err(|e| {
                    KvsError::Escape(format!("invalid escape at byte {}: {}", pos, e))
                })?;
                out.push(byte[0]);
                pos += 3;
            }
            b => {
                out.push(b);
                pos += 1;
            }
        }
    }

    Err(KvsError::Escape(format!(
        "missing terminator after {} bytes",
        input.len()
    )))
}

/// Decode a buffer holding exactly one escaped field
pub fn decode(input: &[u8]) -> Result<Vec<u8>> {
    let (out, consumed) = decode_escaped(input)?;
    if consumed != input.len() {
        return Err(KvsError::Escape(format!(
            "{} bytes after terminator",
            input.len() - consumed
        )));
    }
    Ok(out)
}

// =============================================================================
// Namespace / key / name composition
// =============================================================================

/// The variable-length part of an object identity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameParts {
    pub namespace: Vec<u8>,
    /// Locator key, `None` when absent or equal to the name
    pub key: Option<Vec<u8>>,
    pub name: Vec<u8>,
}

/// Append the escaped `namespace`, marker and key/name fields to `out`
pub fn append_composed(namespace: &[u8], key: Option<&[u8]>, name: &[u8], out: &mut Vec<u8>) {
    append_escaped(namespace, out);

    match key {
        Some(key) if !key.is_empty() && key != name => {
            out.push(if key < name { MARKER_LESS } else { MARKER_GREATER });
            append_escaped(key, out);
            append_escaped(name, out);
        }
        _ => {
            out.push(MARKER_EQUAL);
            append_escaped(name, out);
        }
    }
}

/// Encode namespace, optional key and name as one suffix
pub fn compose(namespace: &[u8], key: Option<&[u8]>, name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(namespace.len() + name.len() + 4);
    append_composed(namespace, key, name, &mut out);
    out
}

/// Decode a suffix built by [`compose`]
///
/// Returns the parts and the number of bytes consumed.
pub fn decompose(input: &[u8]) -> Result<(NameParts, usize)> {
    let (namespace, mut pos) = decode_escaped(input)?;

    let marker = *input
        .get(pos)
        .ok_or_else(|| KvsError::MalformedKey("missing key/name marker".to_string()))?;
    pos += 1;

    let key = match marker {
        MARKER_EQUAL => None,
        MARKER_LESS | MARKER_GREATER => {
            let (key, used) = decode_escaped(&input[pos..])?;
            pos += used;
            Some(key)
        }
        other => {
            return Err(KvsError::MalformedKey(format!(
                "invalid key/name marker 0x{:02x}",
                other
            )))
        }
    };

    let (name, used) = decode_escaped(&input[pos..])?;
    pos += used;

    Ok((
        NameParts {
            namespace,
            key,
            name,
        },
        pos,
    ))
}
