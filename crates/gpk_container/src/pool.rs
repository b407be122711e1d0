//! Deduplicated, offset-addressed string table shared by a container.

use std::cmp::Ordering;

use derive_more::derive::Deref;
use indexmap::IndexMap;
use tracing::{debug, instrument};
use winnow::combinator::{repeat, terminated};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};
use winnow::PResult;

use crate::error::{Error, Result};
use crate::types::latin1_to_string;

/// String table mapping each distinct byte string to its pool offset
///
/// ```
/// use gpk_container::pool::StringPool;
///
/// let pool = StringPool::build([b"bone10".to_vec(), b"bone2".to_vec()], 1, 0);
/// assert_eq!(pool.lookup_offset(b"bone2").unwrap(), 0);
/// assert_eq!(pool.lookup_offset(b"bone10").unwrap(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct StringPool {
    #[deref]
    entries: IndexMap<Vec<u8>, u32>,
    padding: u32,
    first_offset: u32,
}

/// Number of NUL bytes written after a string of `len` bytes
fn pad(len: u32, padding: u32) -> u32 {
    let padding = padding.max(1);
    padding - len % padding
}

impl StringPool {
    /// Build a pool from every string referenced by a container.
    ///
    /// Strings are deduplicated and sorted with numeric-aware ordering before
    /// offsets are assigned. Empty strings are never stored.
    #[instrument(skip(strings))]
    pub fn build<I>(strings: I, padding: u32, first_offset: u32) -> StringPool
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut unique = strings
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        unique.sort_by(|a, b| natural_cmp(a, b));
        unique.dedup();

        let pool = Self::assign(unique, padding, first_offset);
        debug!(strings = pool.len(), size = pool.byte_len(), "built string pool");
        pool
    }

    /// Parse the raw bytes of a pool as found on disk.
    #[instrument(skip(data), fields(size = data.len()), err)]
    pub fn parse(data: &[u8], padding: u32, first_offset: u32) -> Result<StringPool> {
        let mut input = data;
        let mut strings = pool_strings(&mut input)?;
        if !input.is_empty() {
            strings.push(input);
        }

        let strings = strings
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(<[u8]>::to_vec)
            .collect();

        Ok(Self::assign(strings, padding, first_offset))
    }

    fn assign(strings: Vec<Vec<u8>>, padding: u32, first_offset: u32) -> StringPool {
        let mut entries = IndexMap::with_capacity(strings.len());
        let mut offset = first_offset;
        for s in strings {
            let len = s.len() as u32;
            entries.entry(s).or_insert(offset);
            offset += len + pad(len, padding);
        }

        StringPool {
            entries,
            padding,
            first_offset,
        }
    }

    /// Find the string starting at `offset`
    pub fn lookup_index(&self, offset: u32) -> Result<&[u8]> {
        self.entries
            .iter()
            .find(|(_, o)| **o == offset)
            .map(|(s, _)| s.as_slice())
            .ok_or(Error::OffsetNotFound(offset))
    }

    /// Find the offset of `value`
    pub fn lookup_offset(&self, value: &[u8]) -> Result<u32> {
        self.entries
            .get(value)
            .copied()
            .ok_or_else(|| Error::StringNotFound(latin1_to_string(value)))
    }

    /// The strings in offset order
    pub fn strings(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(|s| s.as_slice())
    }

    /// Size of the serialized pool in bytes
    pub fn byte_len(&self) -> u32 {
        self.entries
            .keys()
            .map(|s| s.len() as u32 + pad(s.len() as u32, self.padding))
            .sum()
    }

    /// Serialize the pool
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len() as usize);
        for s in self.entries.keys() {
            out.extend_from_slice(s);
            let padding = pad(s.len() as u32, self.padding);
            out.resize(out.len() + padding as usize, 0);
        }
        out
    }
}

fn pool_strings<'s>(input: &mut &'s [u8]) -> PResult<Vec<&'s [u8]>> {
    repeat(0.., terminated(take_till(0.., 0u8), take_while(1.., 0u8))).parse_next(input)
}

/// Compare byte strings treating runs of ASCII digits as numbers
pub fn natural_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let end_a = i + a[i..].iter().take_while(|c| c.is_ascii_digit()).count();
            let end_b = j + b[j..].iter().take_while(|c| c.is_ascii_digit()).count();
            let num_a = trim_zeros(&a[i..end_a]);
            let num_b = trim_zeros(&b[j..end_b]);

            let ord = num_a
                .len()
                .cmp(&num_b.len())
                .then_with(|| num_a.cmp(num_b))
                .then_with(|| (end_a - i).cmp(&(end_b - j)));
            if ord != Ordering::Equal {
                return ord;
            }
            i = end_a;
            j = end_b;
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            }
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|c| **c == b'0').count();
    &digits[zeros..]
}
