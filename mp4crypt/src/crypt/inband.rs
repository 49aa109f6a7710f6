//! Sample layouts of the schemes that carry their protection data in-band.
//!
//! ISMACryp sample:
//!
//! ```text
//! [selective byte, 0x80 = encrypted]   only when the track is selective
//! [byte stream offset, iv_length bytes] only for encrypted samples
//! [payload, AES-CTR]
//! ```
//!
//! Adobe sample:
//!
//! ```text
//! [flag, 0x80 = encrypted]
//! [16-byte IV]                          only for encrypted samples
//! [payload, AES-128-CBC with PKCS#7 padding]
//! ```

use super::BlockCipher;
use aes::cipher::{StreamCipher, StreamCipherSeek};

pub const ENCRYPTED_FLAG: u8 = 0x80;

/// Parsed ISMACryp sample.
#[derive(Debug, PartialEq, Eq)]
pub struct IsmaSample<'a> {
    pub encrypted: bool,
    pub byte_offset: u64,
    pub payload: &'a [u8],
}

/// Counter block of the 16-byte block holding `byte_offset`.
pub fn isma_counter_block(salt: &[u8; 8], byte_offset: u64) -> [u8; 16] {
    let mut block = [0; 16];
    block[..8].copy_from_slice(salt);
    block[8..].copy_from_slice(&(byte_offset / 16).to_be_bytes());
    block
}

fn isma_apply(cipher: &BlockCipher, salt: &[u8; 8], byte_offset: u64, data: &mut [u8]) {
    let mut ctr = cipher.ctr(&isma_counter_block(salt, byte_offset));
    ctr.seek(byte_offset % 16);
    ctr.apply_keystream(data);
}

pub fn isma_encrypt(
    cipher: &BlockCipher,
    salt: &[u8; 8],
    byte_offset: u64,
    iv_length: u8,
    selective: bool,
    payload: &[u8],
) -> Vec<u8> {
    let iv_length = iv_length as usize;
    let mut sample = Vec::with_capacity(1 + iv_length + payload.len());

    if selective {
        sample.push(ENCRYPTED_FLAG);
    }

    let offset = byte_offset.to_be_bytes();
    if iv_length > 8 {
        sample.resize(sample.len() + iv_length - 8, 0);
        sample.extend_from_slice(&offset);
    } else {
        sample.extend_from_slice(&offset[8 - iv_length..]);
    }

    let start = sample.len();
    sample.extend_from_slice(payload);
    isma_apply(cipher, salt, byte_offset, &mut sample[start..]);
    sample
}

/// Clear sample of a selective ISMACryp track.
pub fn isma_clear(payload: &[u8]) -> Vec<u8> {
    let mut sample = Vec::with_capacity(1 + payload.len());
    sample.push(0);
    sample.extend_from_slice(payload);
    sample
}

pub fn isma_parse(sample: &[u8], selective: bool, iv_length: u8) -> Result<IsmaSample<'_>, String> {
    let mut data = sample;

    let encrypted = if selective {
        let (flag, rest) = data
            .split_first()
            .ok_or("empty sample without selective encryption byte")?;
        data = rest;
        flag & ENCRYPTED_FLAG != 0
    } else {
        true
    };

    if !encrypted {
        return Ok(IsmaSample {
            encrypted,
            byte_offset: 0,
            payload: data,
        });
    }

    let iv_length = iv_length as usize;
    if data.len() < iv_length {
        return Err(format!(
            "sample of {} bytes cannot hold a {}-byte offset",
            data.len(),
            iv_length
        ));
    }

    let (offset, payload) = data.split_at(iv_length);
    let byte_offset = offset
        .iter()
        .rev()
        .take(8)
        .rev()
        .fold(0, |x, y| (x << 8) | *y as u64);

    Ok(IsmaSample {
        encrypted,
        byte_offset,
        payload,
    })
}

pub fn isma_decrypt(cipher: &BlockCipher, salt: &[u8; 8], sample: &IsmaSample<'_>) -> Vec<u8> {
    let mut payload = sample.payload.to_vec();

    if sample.encrypted {
        isma_apply(cipher, salt, sample.byte_offset, &mut payload);
    }

    payload
}

/// Parsed Adobe sample.
#[derive(Debug, PartialEq, Eq)]
pub struct AdobeSample<'a> {
    pub iv: Option<[u8; 16]>,
    pub payload: &'a [u8],
}

pub fn adobe_encrypt(cipher: &BlockCipher, iv: &[u8; 16], payload: &[u8]) -> Result<Vec<u8>, String> {
    let encrypted = cipher.cbc_encrypt_padded(iv, payload)?;
    let mut sample = Vec::with_capacity(17 + encrypted.len());
    sample.push(ENCRYPTED_FLAG);
    sample.extend_from_slice(iv);
    sample.extend_from_slice(&encrypted);
    Ok(sample)
}

pub fn adobe_clear(payload: &[u8]) -> Vec<u8> {
    isma_clear(payload)
}

pub fn adobe_parse(sample: &[u8]) -> Result<AdobeSample<'_>, String> {
    let (flag, data) = sample
        .split_first()
        .ok_or("empty sample without encryption flag")?;

    if flag & ENCRYPTED_FLAG == 0 {
        return Ok(AdobeSample {
            iv: None,
            payload: data,
        });
    }

    if data.len() < 16 {
        return Err(format!("sample of {} bytes cannot hold an IV", data.len()));
    }

    let (iv, payload) = data.split_at(16);
    let mut buf = [0; 16];
    buf.copy_from_slice(iv);

    Ok(AdobeSample {
        iv: Some(buf),
        payload,
    })
}

pub fn adobe_decrypt(cipher: &BlockCipher, sample: &AdobeSample<'_>) -> Result<Vec<u8>, String> {
    match &sample.iv {
        Some(iv) => cipher.cbc_decrypt_padded(iv, sample.payload),
        None => Ok(sample.payload.to_vec()),
    }
}
