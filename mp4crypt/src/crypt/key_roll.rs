use super::BlockCipher;
use crate::{CryptError, EncryptConfig, KeyEntry, Result, Scheme};
use log::debug;
use rand::{RngCore, rngs::OsRng};

/// Mutable IV and key state of one encryption pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyRollState {
    /// Next CTR IV, or the IV derivation seed of CBC schemes.
    pub iv: [u8; 16],
    pub key_index: usize,
    pub samples_since_roll: u32,
    /// Number of IVs issued so far.
    pub issued: u64,
}

/// Key and IV of one encrypted sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleKey {
    pub key_index: usize,
    pub kid: [u8; 16],
    /// Full 16-byte IV or initial counter block.
    pub iv: [u8; 16],
    /// IV bytes stored in the aux info, `None` with a constant IV.
    pub persisted_iv: Option<Vec<u8>>,
}

/// Issues the key and IV of every encrypted sample of a track.
///
/// - CTR with 16-byte IVs: next IV = IV + max(1, blocks of the sample).
/// - CTR with 8-byte IVs: the IV is the high half of the counter block and
///   grows by one per sample.
/// - CBC: IV = AES(active key, seed xor n) for the n-th encrypted sample.
/// - Constant IV: returned unchanged.
/// - ISMACryp: the byte stream offset, see [`KeySchedule::byte_offset`].
pub struct KeySchedule {
    scheme: Scheme,
    entries: Vec<(KeyEntry, BlockCipher)>,
    key_roll: u32,
    iv_size: u8,
    constant_iv: Option<[u8; 16]>,
    byte_offset: u64,
    state: KeyRollState,
}

impl KeySchedule {
    pub fn new(config: &EncryptConfig) -> Result<Self> {
        let keys = &config.track.keys;
        let entries = if keys.rolling.is_empty() {
            keys.default.into_iter().collect::<Vec<_>>()
        } else {
            keys.rolling.clone()
        };

        if entries.is_empty() {
            return Err(CryptError::InvalidConfig("no key provided".to_owned()));
        }

        let key_index = keys.default_key_index;
        if key_index >= entries.len() {
            return Err(CryptError::InvalidConfig(format!(
                "default key index {} out of range for {} keys",
                key_index,
                entries.len()
            )));
        }

        let scheme = config.track.scheme;
        let iv_size = if scheme.is_cbc_mode() { 16 } else { config.iv_size };

        let mut iv = [0; 16];
        match &config.first_iv {
            Some(first_iv) => {
                let len = first_iv.len().min(16);
                iv[..len].copy_from_slice(&first_iv[..len]);
            }
            None => OsRng.fill_bytes(&mut iv[..iv_size as usize]),
        }

        let byte_offset = match &config.first_iv {
            Some(first_iv) if scheme == Scheme::Isma => first_iv
                .iter()
                .rev()
                .take(8)
                .rev()
                .fold(0, |x, y| (x << 8) | *y as u64),
            _ => 0,
        };

        let constant_iv = config.constant_iv.as_ref().map(|x| {
            let mut iv = [0; 16];
            let len = x.len().min(16);
            iv[..len].copy_from_slice(&x[..len]);
            iv
        });

        Ok(Self {
            scheme,
            entries: entries
                .into_iter()
                .map(|x| (x, BlockCipher::new(&x.key)))
                .collect(),
            key_roll: config.key_roll,
            iv_size,
            constant_iv,
            byte_offset,
            state: KeyRollState {
                iv,
                key_index,
                samples_since_roll: 0,
                issued: 0,
            },
        })
    }

    pub fn state(&self) -> &KeyRollState {
        &self.state
    }

    /// Cipher of the key in use, the one the last issued [`SampleKey`] names.
    pub fn active_cipher(&self) -> &BlockCipher {
        &self.entries[self.state.key_index].1
    }

    /// Issue the key and IV of the next encrypted sample.
    ///
    /// `encrypted_bytes` is the number of bytes the sample puts through the
    /// cipher, used to step 16-byte CTR IVs past the counter blocks it consumes.
    pub fn issue(&mut self, encrypted_bytes: usize) -> SampleKey {
        if self.key_roll > 0 && self.state.samples_since_roll == self.key_roll {
            self.state.key_index = (self.state.key_index + 1) % self.entries.len();
            self.state.samples_since_roll = 0;
            debug!(
                "Rolling to key {} (KID {})",
                self.state.key_index,
                hex::encode(self.entries[self.state.key_index].0.kid)
            );
        }
        self.state.samples_since_roll += 1;

        let (entry, cipher) = &self.entries[self.state.key_index];

        let (iv, persisted_iv) = if let Some(constant_iv) = self.constant_iv {
            (constant_iv, None)
        } else if self.scheme.is_cbc_mode() {
            let mut block = self.state.iv;
            for (x, y) in block
                .iter_mut()
                .zip((self.state.issued as u128).to_be_bytes())
            {
                *x ^= y;
            }
            let iv = cipher.encrypt_block(block);
            (iv, Some(iv.to_vec()))
        } else {
            let iv = self.state.iv;

            if self.iv_size == 8 {
                let mut high = [0; 8];
                high.copy_from_slice(&iv[..8]);
                let high = u64::from_be_bytes(high).wrapping_add(1);
                self.state.iv[..8].copy_from_slice(&high.to_be_bytes());
            } else {
                let blocks = encrypted_bytes.div_ceil(16).max(1) as u128;
                self.state.iv = u128::from_be_bytes(iv).wrapping_add(blocks).to_be_bytes();
            }

            (iv, Some(iv[..self.iv_size as usize].to_vec()))
        };

        self.state.issued += 1;

        SampleKey {
            key_index: self.state.key_index,
            kid: entry.kid,
            iv,
            persisted_iv,
        }
    }

    /// Byte stream offset of the next ISMACryp sample, advanced past it.
    pub fn byte_offset(&mut self, sample_len: usize) -> u64 {
        let offset = self.byte_offset;
        self.byte_offset = self.byte_offset.wrapping_add(sample_len as u64);
        offset
    }
}
