//! Subsample planning and per-scheme transform of Common Encryption samples.

use super::{BlockCipher, SubsampleEntry, UnitSplit};
use crate::{BlockAlign, Pattern, Scheme};
use aes::cipher::StreamCipher;
use std::ops::Range;

/// Direction of a sample transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Build the subsample pairs of a sample split into `units`.
///
/// Each unit with protected bytes gives one pair. When `block_align` applies
/// to `scheme`, the trailing partial block of every unit moves to its clear
/// run. Clear bytes of units left without protected bytes carry over to the
/// next pair. An empty list means the whole sample is protected. The sample
/// length must fit in 32 bits.
pub fn plan(
    scheme: Scheme,
    block_align: BlockAlign,
    units: &[UnitSplit],
) -> Vec<SubsampleEntry> {
    let align = block_align.applies(scheme);
    let mut subsamples = Vec::with_capacity(units.len());
    let mut clear = 0;

    for unit in units {
        let mut protected = unit.protected;
        clear += unit.clear;

        if align {
            clear += protected % 16;
            protected -= protected % 16;
        }

        if protected > 0 {
            push_entry(&mut subsamples, clear, protected);
            clear = 0;
        }
    }

    if clear > 0 {
        push_entry(&mut subsamples, clear, 0);
    }

    if let [entry] = subsamples.as_slice()
        && entry.bytes_of_clear_data == 0
    {
        return Vec::new();
    }

    subsamples
}

fn push_entry(subsamples: &mut Vec<SubsampleEntry>, mut clear: usize, protected: usize) {
    while clear > u16::MAX as usize {
        subsamples.push(SubsampleEntry::new(u16::MAX, 0));
        clear -= u16::MAX as usize;
    }

    subsamples.push(SubsampleEntry::new(clear as u16, protected as u32));
}

/// Byte ranges of a sample covered by protected data.
pub fn encrypted_ranges(len: usize, subsamples: &[SubsampleEntry]) -> Vec<Range<usize>> {
    if subsamples.is_empty() {
        return vec![0..len];
    }

    let mut ranges = Vec::with_capacity(subsamples.len());
    let mut offset = 0;

    for subsample in subsamples {
        offset += subsample.bytes_of_clear_data as usize;
        let end = offset + subsample.bytes_of_encrypted_data as usize;

        if end > offset {
            ranges.push(offset..end);
        }

        offset = end;
    }

    ranges
}

/// Spans of a protected range which go through the cipher.
///
/// With `whole_blocks` only complete 16-byte blocks are kept, which is how
/// CBC schemes leave a trailing partial block clear.
pub fn crypt_spans(len: usize, pattern: Pattern, whole_blocks: bool) -> Vec<Range<usize>> {
    let crypt_size = pattern.crypt_byte_block as usize * 16;
    let skip_size = pattern.skip_byte_block as usize * 16;
    let align = |start: usize, end: usize| {
        if whole_blocks {
            start + (end - start) / 16 * 16
        } else {
            end
        }
    };

    if crypt_size == 0 {
        let end = align(0, len);
        return if end > 0 { vec![0..end] } else { Vec::new() };
    }

    let mut spans = Vec::new();
    let mut offset = 0;

    while offset < len {
        let end = align(offset, (offset + crypt_size).min(len));

        if end > offset {
            spans.push(offset..end);
        }

        offset += crypt_size + skip_size;
    }

    spans
}

/// Number of bytes that go through the cipher.
pub fn encrypted_len(scheme: Scheme, pattern: Pattern, ranges: &[Range<usize>]) -> usize {
    ranges
        .iter()
        .flat_map(|x| crypt_spans(x.len(), pattern, scheme.is_cbc_mode()))
        .map(|x| x.len())
        .sum()
}

/// Transform the protected ranges of a CENC, CBC1, CENS or CBCS sample in place.
///
/// - `cenc`: one keystream continues across ranges.
/// - `cens`: one keystream advancing over crypt blocks only.
/// - `cbc1`: one CBC chain across ranges.
/// - `cbcs`: CBC chain restarts from `iv` in every range.
pub fn transform(
    cipher: &BlockCipher,
    scheme: Scheme,
    pattern: Pattern,
    iv: &[u8; 16],
    data: &mut [u8],
    ranges: &[Range<usize>],
    direction: Direction,
) {
    if scheme.is_ctr_mode() {
        let mut ctr = cipher.ctr(iv);

        for range in ranges {
            for span in crypt_spans(range.len(), pattern, false) {
                ctr.apply_keystream(&mut data[range.start + span.start..range.start + span.end]);
            }
        }

        return;
    }

    let mut chain = *iv;

    for range in ranges {
        if scheme == Scheme::Cbcs {
            chain = *iv;
        }

        for span in crypt_spans(range.len(), pattern, true) {
            let buf = &mut data[range.start + span.start..range.start + span.end];

            match direction {
                Direction::Encrypt => cipher.cbc_encrypt(&mut chain, buf),
                Direction::Decrypt => cipher.cbc_decrypt(&mut chain, buf),
            }
        }
    }
}
