//! Per-track key and scheme configuration.
//!
//! A pass is driven by either an [`EncryptConfig`] or a [`DecryptConfig`].
//! Both share [`TrackKeys`], the scheme and key material of one track.
//! Scheme parameters needed only when protecting (IV size, pattern,
//! selective encryption, clear bytes) live in [`EncryptConfig`]; decryption
//! reads them back from the protection signalling of the track.

use crate::{CryptError, Result, Scheme, SupportedSchemes};
use std::str::FromStr;

/// A KID and the key it names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEntry {
    pub kid: [u8; 16],
    pub key: [u8; 16],
}

/// Key material of a track.
///
/// With an empty `rolling` array every sample uses the default entry.
/// Otherwise `rolling[default_key_index]` is active at the start of a pass and
/// the key schedule cycles through the array.
#[derive(Clone, Debug, Default)]
pub struct KeySet {
    pub default: Option<KeyEntry>,
    pub rolling: Vec<KeyEntry>,
    pub default_key_index: usize,
}

impl KeySet {
    pub fn new(kid: [u8; 16], key: [u8; 16]) -> Self {
        Self {
            default: Some(KeyEntry { kid, key }),
            ..Default::default()
        }
    }

    /// Number of keys in the rolling array (`KID_count`).
    pub fn kid_count(&self) -> usize {
        self.rolling.len()
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.rolling.is_empty()
    }

    /// Entry selected by a key index of the key schedule.
    pub fn active(&self, index: usize) -> Option<KeyEntry> {
        if self.rolling.is_empty() {
            self.default
        } else {
            self.rolling.get(index).copied()
        }
    }

    /// KID signalled as the track default.
    pub fn default_kid(&self) -> Option<[u8; 16]> {
        self.default
            .or_else(|| self.active(self.default_key_index))
            .map(|x| x.kid)
    }

    /// Get the key for a given KID.
    pub fn find(&self, kid: &[u8; 16]) -> Option<&[u8; 16]> {
        self.default
            .iter()
            .chain(self.rolling.iter())
            .find(|x| &x.kid == kid)
            .map(|x| &x.key)
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(CryptError::InvalidConfig(
                "no key provided - use .key(kid, key) to add keys".to_owned(),
            ));
        }

        if self.rolling.is_empty() {
            if self.default_key_index != 0 {
                return Err(CryptError::InvalidConfig(format!(
                    "default key index {} set without a rolling key array",
                    self.default_key_index
                )));
            }
        } else if self.default_key_index >= self.rolling.len() {
            return Err(CryptError::InvalidConfig(format!(
                "default key index {} out of range for {} keys",
                self.default_key_index,
                self.rolling.len()
            )));
        }

        for (i, entry) in self.rolling.iter().enumerate() {
            if self.rolling[..i]
                .iter()
                .any(|x| x.kid == entry.kid && x.key != entry.key)
            {
                return Err(CryptError::InvalidConfig(format!(
                    "KID {} is mapped to two different keys",
                    hex::encode(entry.kid)
                )));
            }
        }

        Ok(())
    }
}

/// Pattern of encrypted and clear 16-byte blocks (CENS and CBCS only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    pub crypt_byte_block: u8,
    pub skip_byte_block: u8,
}

impl Pattern {
    pub fn new(crypt_byte_block: u8, skip_byte_block: u8) -> Self {
        Self {
            crypt_byte_block,
            skip_byte_block,
        }
    }

    /// No pattern, the whole protected range is encrypted.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if this pattern leaves some blocks of a protected range clear.
    pub fn is_partial(&self) -> bool {
        self.crypt_byte_block != 0 && self.skip_byte_block != 0
    }

    fn validate(&self) -> Result<()> {
        if self.crypt_byte_block == 0 && self.skip_byte_block != 0 {
            return Err(CryptError::InvalidConfig(format!(
                "pattern 0:{} encrypts nothing",
                self.skip_byte_block
            )));
        }

        if self.crypt_byte_block > 15 || self.skip_byte_block > 15 {
            return Err(CryptError::InvalidConfig(format!(
                "pattern {}:{} does not fit in 4-bit block counts",
                self.crypt_byte_block, self.skip_byte_block
            )));
        }

        Ok(())
    }
}

/// Selective encryption policy (`sel_enc_type`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectiveMode {
    /// Encrypt every sample.
    #[default]
    None,
    /// Only encrypt random access points.
    Rap,
    /// Only encrypt samples which are not random access points.
    NonRap,
    /// Encrypt pseudo-random samples, about one in two.
    Random,
    /// Encrypt one pseudo-random sample in every window of `range` samples.
    RandomRange,
    /// Encrypt the first sample of every window of `range` samples.
    Range,
    /// Leave the first `range` samples clear, encrypt the rest.
    Preview,
    /// Never encrypt, signal samples in the unencrypted sample group.
    Clear,
    /// Never encrypt, do not signal samples as unencrypted.
    ClearForced,
}

impl SelectiveMode {
    pub fn code(&self) -> &'static str {
        match self {
            SelectiveMode::None => "NONE",
            SelectiveMode::Rap => "RAP",
            SelectiveMode::NonRap => "NON_RAP",
            SelectiveMode::Random => "RAND",
            SelectiveMode::RandomRange => "RAND_RANGE",
            SelectiveMode::Range => "RANGE",
            SelectiveMode::Preview => "PREVIEW",
            SelectiveMode::Clear => "CLEAR",
            SelectiveMode::ClearForced => "CLEAR_FORCED",
        }
    }

    fn uses_range(&self) -> bool {
        matches!(self, SelectiveMode::RandomRange | SelectiveMode::Range)
    }
}

impl FromStr for SelectiveMode {
    type Err = CryptError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_uppercase().replace('-', "_");

        Ok(match code.as_str() {
            "" | "NONE" => SelectiveMode::None,
            "RAP" => SelectiveMode::Rap,
            "NON_RAP" | "NONRAP" => SelectiveMode::NonRap,
            "RAND" | "RANDOM" => SelectiveMode::Random,
            "RAND_RANGE" | "RANDOM_RANGE" => SelectiveMode::RandomRange,
            "RANGE" => SelectiveMode::Range,
            "PREVIEW" => SelectiveMode::Preview,
            "CLEAR" => SelectiveMode::Clear,
            "CLEAR_FORCED" | "FORCE_CLEAR" => SelectiveMode::ClearForced,
            _ => {
                return Err(CryptError::InvalidConfig(format!(
                    "unknown selective encryption type {}",
                    s
                )));
            }
        })
    }
}

/// Selective encryption policy with its range parameter and PRNG seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectiveEncryption {
    pub mode: SelectiveMode,
    pub range: u32,
    pub seed: u64,
}

impl SelectiveEncryption {
    pub fn new(mode: SelectiveMode, range: u32) -> Self {
        Self {
            mode,
            range,
            seed: 0,
        }
    }

    /// Check if some samples may be left clear.
    pub fn is_selective(&self) -> bool {
        self.mode != SelectiveMode::None
    }
}

/// Alignment of the protected part of every unit to 16-byte blocks.
///
/// CENS is always aligned and CBCS never is, this only changes CENC and CBC1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockAlign {
    /// Align CBC1, leave CENC unaligned.
    #[default]
    Default,
    /// Never align CENC or CBC1.
    Never,
    /// Align CENC and CBC1, even when a sample ends up without protected bytes.
    Always,
}

impl BlockAlign {
    /// Check if the trailing partial block of a unit moves to its clear run.
    pub fn applies(&self, scheme: Scheme) -> bool {
        match scheme {
            Scheme::Cens => true,
            Scheme::Cbc1 => *self != BlockAlign::Never,
            Scheme::Cenc => *self == BlockAlign::Always,
            _ => false,
        }
    }
}

impl FromStr for BlockAlign {
    type Err = CryptError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "default" => BlockAlign::Default,
            "1" | "never" | "disable" => BlockAlign::Never,
            "2" | "always" => BlockAlign::Always,
            _ => {
                return Err(CryptError::InvalidConfig(format!(
                    "unknown block alignment {}",
                    s
                )));
            }
        })
    }
}

/// Where clear samples of a protected track find their sample description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClearSampleDescription {
    /// Clear and protected samples share the protected entry.
    #[default]
    Shared,
    /// Dedicated clear entry placed before the protected one.
    Before,
    /// Dedicated clear entry placed after the protected one.
    After,
}

impl ClearSampleDescription {
    /// Value of `force_clear_stsd_idx`.
    pub fn index(&self) -> u8 {
        match self {
            ClearSampleDescription::Shared => 0,
            ClearSampleDescription::Before => 1,
            ClearSampleDescription::After => 2,
        }
    }
}

impl FromStr for ClearSampleDescription {
    type Err = CryptError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "no" | "none" | "shared" => ClearSampleDescription::Shared,
            "1" | "before" => ClearSampleDescription::Before,
            "2" | "after" => ClearSampleDescription::After,
            _ => {
                return Err(CryptError::InvalidConfig(format!(
                    "unknown clear sample description placement {}",
                    s
                )));
            }
        })
    }
}

/// Scheme and keys of one track, shared by both directions.
#[derive(Clone, Debug)]
pub struct TrackKeys {
    pub track_id: u32,
    pub scheme: Scheme,
    pub keys: KeySet,
    /// ISMACryp salt, the high half of every counter block.
    pub salt: [u8; 8],
}

impl TrackKeys {
    pub fn new(scheme: Scheme, track_id: u32) -> Self {
        Self {
            track_id,
            scheme,
            keys: KeySet::default(),
            salt: [0; 8],
        }
    }

    fn validate(&self, supported: &SupportedSchemes) -> Result<()> {
        supported.check(self.scheme)?;
        self.keys.validate()?;

        if self.scheme.is_inband() && self.keys.kid_count() > 0 {
            return Err(CryptError::InvalidConfig(format!(
                "key rolling is not available with {}",
                self.scheme
            )));
        }

        Ok(())
    }
}

/// Configuration of an encryption pass.
#[derive(Clone, Debug)]
pub struct EncryptConfig {
    pub track: TrackKeys,
    /// Size of persisted per-sample IVs, 8 or 16.
    pub iv_size: u8,
    pub pattern: Pattern,
    /// Constant IV for CBCS, 8 or 16 bytes. Replaces per-sample IVs.
    pub constant_iv: Option<Vec<u8>>,
    /// Number of samples encrypted under one key before rolling to the next.
    pub key_roll: u32,
    pub selective: SelectiveEncryption,
    /// Forced clear prefix length; `None` or zero lets the codec locator decide.
    pub clear_bytes: Option<u32>,
    pub allow_encrypted_slice_header: bool,
    pub block_align: BlockAlign,
    /// Placement of a dedicated sample description for clear samples.
    pub clear_sample_description: ClearSampleDescription,
    /// Turn clear prefix parse warnings into errors.
    pub strict_parsing: bool,
    /// IV of the first encrypted sample, random when absent.
    pub first_iv: Option<Vec<u8>>,
    pub kms_uri: Option<String>,
    pub scheme_uri: Option<String>,
    /// Adobe `adkm` metadata.
    pub metadata: Option<String>,
}

impl EncryptConfig {
    pub fn builder(scheme: Scheme, track_id: u32) -> EncryptConfigBuilder {
        EncryptConfigBuilder::new(scheme, track_id)
    }

    pub fn scheme(&self) -> Scheme {
        self.track.scheme
    }

    /// Pattern in effect, none for schemes without pattern encryption.
    pub fn effective_pattern(&self) -> Pattern {
        if self.track.scheme.is_pattern() {
            self.pattern
        } else {
            Pattern::none()
        }
    }

    /// Check keys, IV sizing, pattern and selective encryption parameters.
    pub fn validate(&self, supported: &SupportedSchemes) -> Result<()> {
        let scheme = self.track.scheme;
        self.track.validate(supported)?;

        if self.iv_size != 8 && self.iv_size != 16 {
            return Err(CryptError::InvalidConfig(format!(
                "IV size must be 8 or 16, got {}",
                self.iv_size
            )));
        }

        if let Some(constant_iv) = &self.constant_iv {
            if scheme != Scheme::Cbcs {
                return Err(CryptError::InvalidConfig(format!(
                    "constant IV is only allowed with cbcs, not {}",
                    scheme
                )));
            }

            if constant_iv.len() != 8 && constant_iv.len() != 16 {
                return Err(CryptError::InvalidConfig(format!(
                    "constant IV size must be 8 or 16, got {}",
                    constant_iv.len()
                )));
            }
        } else if scheme.is_cbc_mode() && self.iv_size != 16 {
            return Err(CryptError::InvalidConfig(format!(
                "{} needs 16-byte IVs, got {}",
                scheme, self.iv_size
            )));
        }

        if let Some(first_iv) = &self.first_iv
            && first_iv.len() != self.iv_size as usize
        {
            return Err(CryptError::InvalidConfig(format!(
                "first IV has {} bytes but IV size is {}",
                first_iv.len(),
                self.iv_size
            )));
        }

        if scheme.is_pattern() {
            self.pattern.validate()?;
        }

        if self.selective.mode.uses_range() && self.selective.range == 0 {
            return Err(CryptError::InvalidConfig(format!(
                "selective encryption {} needs a non-zero range",
                self.selective.mode.code()
            )));
        }

        Ok(())
    }
}

/// Builder for creating [`EncryptConfig`] instances.
///
/// # Example
///
/// ```
/// use mp4crypt::{EncryptConfig, Scheme, SelectiveMode};
///
/// let config = EncryptConfig::builder(Scheme::Cbcs, 1)
///     .key("eb676abbcb345e96bbcf616630f1a3da", "100b6c20940f779a4589152b57d2dacb")?
///     .pattern(1, 9)
///     .selective(SelectiveMode::Rap, 0)
///     .build();
/// # Ok::<(), mp4crypt::CryptError>(())
/// ```
pub struct EncryptConfigBuilder {
    config: EncryptConfig,
}

impl EncryptConfigBuilder {
    pub fn new(scheme: Scheme, track_id: u32) -> Self {
        Self {
            config: EncryptConfig {
                track: TrackKeys::new(scheme, track_id),
                iv_size: if scheme.is_cbc_mode() { 16 } else { 8 },
                pattern: if scheme.is_pattern() {
                    Pattern::new(1, 9)
                } else {
                    Pattern::none()
                },
                constant_iv: None,
                key_roll: 0,
                selective: SelectiveEncryption::default(),
                clear_bytes: None,
                allow_encrypted_slice_header: false,
                block_align: BlockAlign::Default,
                clear_sample_description: ClearSampleDescription::Shared,
                strict_parsing: false,
                first_iv: None,
                kms_uri: None,
                scheme_uri: None,
                metadata: None,
            },
        }
    }

    /// Set the default KID/key pair from hex strings.
    pub fn key(mut self, kid: &str, key: &str) -> Result<Self> {
        self.config.track.keys.default = Some(KeyEntry {
            kid: parse_hex_16(kid)?,
            key: parse_hex_16(key)?,
        });
        Ok(self)
    }

    /// Set the default KID/key pair from raw bytes.
    pub fn key_bytes(mut self, kid: [u8; 16], key: [u8; 16]) -> Self {
        self.config.track.keys.default = Some(KeyEntry { kid, key });
        self
    }

    /// Append a KID/key pair to the rolling key array.
    pub fn rolling_key(mut self, kid: [u8; 16], key: [u8; 16]) -> Self {
        self.config.track.keys.rolling.push(KeyEntry { kid, key });
        self
    }

    pub fn default_key_index(mut self, index: usize) -> Self {
        self.config.track.keys.default_key_index = index;
        self
    }

    pub fn key_roll(mut self, samples: u32) -> Self {
        self.config.key_roll = samples;
        self
    }

    pub fn salt(mut self, salt: [u8; 8]) -> Self {
        self.config.track.salt = salt;
        self
    }

    pub fn iv_size(mut self, iv_size: u8) -> Self {
        self.config.iv_size = iv_size;
        self
    }

    pub fn first_iv(mut self, iv: &[u8]) -> Self {
        self.config.first_iv = Some(iv.to_vec());
        self
    }

    pub fn constant_iv(mut self, iv: &[u8]) -> Self {
        self.config.constant_iv = Some(iv.to_vec());
        self
    }

    pub fn pattern(mut self, crypt_byte_block: u8, skip_byte_block: u8) -> Self {
        self.config.pattern = Pattern::new(crypt_byte_block, skip_byte_block);
        self
    }

    pub fn selective(mut self, mode: SelectiveMode, range: u32) -> Self {
        self.config.selective.mode = mode;
        self.config.selective.range = range;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.selective.seed = seed;
        self
    }

    pub fn clear_bytes(mut self, clear_bytes: u32) -> Self {
        self.config.clear_bytes = Some(clear_bytes);
        self
    }

    pub fn allow_encrypted_slice_header(mut self, allow: bool) -> Self {
        self.config.allow_encrypted_slice_header = allow;
        self
    }

    pub fn strict_parsing(mut self, strict: bool) -> Self {
        self.config.strict_parsing = strict;
        self
    }

    pub fn block_align(mut self, block_align: BlockAlign) -> Self {
        self.config.block_align = block_align;
        self
    }

    pub fn clear_sample_description(mut self, placement: ClearSampleDescription) -> Self {
        self.config.clear_sample_description = placement;
        self
    }

    pub fn kms_uri<T: Into<String>>(mut self, uri: T) -> Self {
        self.config.kms_uri = Some(uri.into());
        self
    }

    pub fn scheme_uri<T: Into<String>>(mut self, uri: T) -> Self {
        self.config.scheme_uri = Some(uri.into());
        self
    }

    pub fn metadata<T: Into<String>>(mut self, metadata: T) -> Self {
        self.config.metadata = Some(metadata.into());
        self
    }

    /// Build the config. Validation happens when a pass is initialized.
    pub fn build(self) -> EncryptConfig {
        self.config
    }
}

/// Configuration of a decryption pass.
#[derive(Clone, Debug)]
pub struct DecryptConfig {
    pub track: TrackKeys,
}

impl DecryptConfig {
    pub fn new(scheme: Scheme, track_id: u32) -> Self {
        Self {
            track: TrackKeys::new(scheme, track_id),
        }
    }

    /// Add a KID/key pair from hex strings.
    pub fn key(mut self, kid: &str, key: &str) -> Result<Self> {
        let entry = KeyEntry {
            kid: parse_hex_16(kid)?,
            key: parse_hex_16(key)?,
        };
        self.push_key(entry);
        Ok(self)
    }

    /// Add a KID/key pair from raw bytes.
    pub fn key_bytes(mut self, kid: [u8; 16], key: [u8; 16]) -> Self {
        self.push_key(KeyEntry { kid, key });
        self
    }

    pub fn salt(mut self, salt: [u8; 8]) -> Self {
        self.track.salt = salt;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.track.scheme
    }

    pub fn validate(&self, supported: &SupportedSchemes) -> Result<()> {
        supported.check(self.track.scheme)?;
        self.track.keys.validate()
    }

    fn push_key(&mut self, entry: KeyEntry) {
        if self.track.keys.default.is_none() {
            self.track.keys.default = Some(entry);
        } else {
            self.track.keys.rolling.push(entry);
        }
    }
}

/// Configuration of one pass over a track, keyed by direction.
#[derive(Clone, Debug)]
pub enum TrackCryptConfig {
    Encrypt(EncryptConfig),
    Decrypt(DecryptConfig),
}

impl TrackCryptConfig {
    pub fn track(&self) -> &TrackKeys {
        match self {
            TrackCryptConfig::Encrypt(x) => &x.track,
            TrackCryptConfig::Decrypt(x) => &x.track,
        }
    }
}

/// Parse a 16-byte hex string, with or without a `0x` prefix.
pub fn parse_hex_16(input: &str) -> Result<[u8; 16]> {
    let bytes = parse_hex(input)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptError::HexWrongLength {
            expected: 16,
            actual: bytes.len(),
        })
}

/// Parse a hex string of any length, with or without a `0x` prefix.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let input = input.trim();
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    Ok(hex::decode(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KID: &str = "eb676abbcb345e96bbcf616630f1a3da";
    const KEY: &str = "100b6c20940f779a4589152b57d2dacb";

    fn cenc() -> EncryptConfigBuilder {
        EncryptConfig::builder(Scheme::Cenc, 1).key(KID, KEY).unwrap()
    }

    #[test]
    fn test_parse_hex_16() {
        let result = parse_hex_16("0xeb676abbcb345e96bbcf616630f1a3da");
        assert_eq!(result.unwrap()[0], 0xeb);
        assert!(parse_hex_16("invalid").is_err());
        assert!(matches!(
            parse_hex_16("eb676abb"),
            Err(CryptError::HexWrongLength {
                expected: 16,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_valid_config() {
        let config = cenc().build();
        assert!(config.validate(&SupportedSchemes::all()).is_ok());
        assert_eq!(config.effective_pattern(), Pattern::none());
    }

    #[test]
    fn test_no_keys() {
        let config = EncryptConfig::builder(Scheme::Cenc, 1).build();
        assert!(matches!(
            config.validate(&SupportedSchemes::all()),
            Err(CryptError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_key_index_out_of_range() {
        let config = cenc()
            .rolling_key([1; 16], [2; 16])
            .rolling_key([3; 16], [4; 16])
            .default_key_index(5)
            .build();
        assert!(matches!(
            config.validate(&SupportedSchemes::all()),
            Err(CryptError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cbc_needs_16_byte_iv() {
        let config = EncryptConfig::builder(Scheme::Cbc1, 1)
            .key(KID, KEY)
            .unwrap()
            .iv_size(8)
            .build();
        assert!(config.validate(&SupportedSchemes::all()).is_err());
    }

    #[test]
    fn test_constant_iv_only_for_cbcs() {
        let config = cenc().constant_iv(&[0; 16]).build();
        assert!(config.validate(&SupportedSchemes::all()).is_err());

        let config = EncryptConfig::builder(Scheme::Cbcs, 1)
            .key(KID, KEY)
            .unwrap()
            .constant_iv(&[7; 16])
            .build();
        assert!(config.validate(&SupportedSchemes::all()).is_ok());
    }

    #[test]
    fn test_pattern_validation() {
        let config = EncryptConfig::builder(Scheme::Cens, 1)
            .key(KID, KEY)
            .unwrap()
            .pattern(0, 9)
            .build();
        assert!(config.validate(&SupportedSchemes::all()).is_err());

        // Ignored on non-pattern schemes.
        let config = cenc().pattern(0, 9).build();
        assert!(config.validate(&SupportedSchemes::all()).is_ok());
    }

    #[test]
    fn test_range_needed() {
        let config = cenc().selective(SelectiveMode::Range, 0).build();
        assert!(config.validate(&SupportedSchemes::all()).is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = cenc().build();
        assert!(matches!(
            config.validate(&SupportedSchemes::all().without(Scheme::Cenc)),
            Err(CryptError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_key_lookup() {
        let config = DecryptConfig::new(Scheme::Cenc, 1)
            .key(KID, KEY)
            .unwrap()
            .key_bytes([9; 16], [8; 16]);
        let keys = &config.track.keys;
        assert_eq!(keys.find(&parse_hex_16(KID).unwrap()), Some(&parse_hex_16(KEY).unwrap()));
        assert_eq!(keys.find(&[9; 16]), Some(&[8; 16]));
        assert_eq!(keys.find(&[0; 16]), None);
    }

    #[test]
    fn test_selective_codes() {
        for mode in [
            SelectiveMode::None,
            SelectiveMode::Rap,
            SelectiveMode::NonRap,
            SelectiveMode::Random,
            SelectiveMode::RandomRange,
            SelectiveMode::Range,
            SelectiveMode::Preview,
            SelectiveMode::Clear,
            SelectiveMode::ClearForced,
        ] {
            assert_eq!(mode.code().parse::<SelectiveMode>().unwrap(), mode);
        }
        assert_eq!("non-rap".parse::<SelectiveMode>().unwrap(), SelectiveMode::NonRap);
    }

    #[test]
    fn test_block_align() {
        assert_eq!("2".parse::<BlockAlign>().unwrap(), BlockAlign::Always);
        assert_eq!("never".parse::<BlockAlign>().unwrap(), BlockAlign::Never);
        assert!("3".parse::<BlockAlign>().is_err());

        assert!(BlockAlign::Default.applies(Scheme::Cbc1));
        assert!(!BlockAlign::Default.applies(Scheme::Cenc));
        assert!(!BlockAlign::Never.applies(Scheme::Cbc1));
        assert!(BlockAlign::Never.applies(Scheme::Cens));
        assert!(BlockAlign::Always.applies(Scheme::Cenc));
        assert!(!BlockAlign::Always.applies(Scheme::Cbcs));
    }

    #[test]
    fn test_clear_sample_description() {
        for placement in [
            ClearSampleDescription::Shared,
            ClearSampleDescription::Before,
            ClearSampleDescription::After,
        ] {
            let parsed = placement.index().to_string().parse::<ClearSampleDescription>();
            assert_eq!(parsed.unwrap(), placement);
        }
        assert_eq!(
            "after".parse::<ClearSampleDescription>().unwrap(),
            ClearSampleDescription::After
        );
        assert!("middle".parse::<ClearSampleDescription>().is_err());
    }
}
