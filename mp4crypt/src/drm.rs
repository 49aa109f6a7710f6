//! DRM descriptor files.
//!
//! A descriptor lists the protection of the tracks of one file:
//!
//! ```xml
//! <DRMFile>
//!   <CrypTrack trackID="1" scheme="cbcs" crypt_byte_block="1" skip_byte_block="9"
//!              constant_IV="0x0a610676cb88f302d10ac8bc66e039ed">
//!     <key KID="0xeb676abbcb345e96bbcf616630f1a3da" value="0x100b6c20940f779a4589152b57d2dacb"/>
//!   </CrypTrack>
//! </DRMFile>
//! ```
//!
//! With a single `<key>` it is the default KID/key pair of the track. Several
//! `<key>` elements form the rolling key array, `defaultKeyIdx` selecting the
//! one in use at the start.

use crate::{
    CryptError, DecryptConfig, EncryptConfig, KeyEntry, KeySet, Pattern, Result, Scheme,
    SelectiveEncryption, SelectiveMode, SupportedSchemes,
    config::{parse_hex, parse_hex_16},
    engine::{PassReport, decrypt_with_family, encrypt_with_family},
    store::MediaFile,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename = "DRMFile")]
pub struct DrmFile {
    #[serde(rename = "CrypTrack", default)]
    pub tracks: Vec<CrypTrack>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CrypTrack {
    #[serde(rename = "@trackID")]
    pub track_id: u32,
    #[serde(rename = "@scheme", skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(rename = "@IV_size", skip_serializing_if = "Option::is_none")]
    pub iv_size: Option<u8>,
    #[serde(rename = "@first_IV", skip_serializing_if = "Option::is_none")]
    pub first_iv: Option<String>,
    #[serde(rename = "@keyRoll", skip_serializing_if = "Option::is_none")]
    pub key_roll: Option<u32>,
    #[serde(rename = "@defaultKeyIdx", skip_serializing_if = "Option::is_none")]
    pub default_key_index: Option<usize>,
    #[serde(rename = "@selectiveType", skip_serializing_if = "Option::is_none")]
    pub selective_type: Option<String>,
    #[serde(rename = "@selectiveRange", skip_serializing_if = "Option::is_none")]
    pub selective_range: Option<u32>,
    #[serde(rename = "@seed", skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(rename = "@crypt_byte_block", skip_serializing_if = "Option::is_none")]
    pub crypt_byte_block: Option<u8>,
    #[serde(rename = "@skip_byte_block", skip_serializing_if = "Option::is_none")]
    pub skip_byte_block: Option<u8>,
    #[serde(rename = "@constant_IV", skip_serializing_if = "Option::is_none")]
    pub constant_iv: Option<String>,
    #[serde(rename = "@clearBytes", skip_serializing_if = "Option::is_none")]
    pub clear_bytes: Option<u32>,
    #[serde(
        rename = "@allowEncryptedSliceHeader",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_encrypted_slice_header: Option<String>,
    /// `default`, `disable` or `always`.
    #[serde(rename = "@blockAlign", skip_serializing_if = "Option::is_none")]
    pub block_align: Option<String>,
    /// `none`, `before` or `after`.
    #[serde(rename = "@clearStsd", skip_serializing_if = "Option::is_none")]
    pub clear_stsd: Option<String>,
    #[serde(rename = "@salt", skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(rename = "@kms_URI", skip_serializing_if = "Option::is_none")]
    pub kms_uri: Option<String>,
    #[serde(rename = "@scheme_URI", skip_serializing_if = "Option::is_none")]
    pub scheme_uri: Option<String>,
    #[serde(rename = "@metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(rename = "key", default)]
    pub keys: Vec<KeyElement>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct KeyElement {
    #[serde(rename = "@KID")]
    pub kid: String,
    #[serde(rename = "@value")]
    pub value: String,
}

impl DrmFile {
    /// Parse xml as a DRM descriptor.
    pub fn parse(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml).map_err(|x| CryptError::Descriptor(x.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading DRM descriptor {}", path.display());
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn to_xml(&self) -> Result<String> {
        quick_xml::se::to_string(self).map_err(|x| CryptError::Descriptor(x.to_string()))
    }

    pub fn track(&self, track_id: u32) -> Option<&CrypTrack> {
        self.tracks.iter().find(|x| x.track_id == track_id)
    }
}

impl CrypTrack {
    fn invalid(&self, reason: String) -> CryptError {
        CryptError::Descriptor(format!("track {}: {}", self.track_id, reason))
    }

    pub fn scheme(&self) -> Result<Option<Scheme>> {
        self.scheme.as_deref().map(str::parse).transpose()
    }

    fn key_set(&self) -> Result<KeySet> {
        let entries = self
            .keys
            .iter()
            .map(|x| {
                Ok(KeyEntry {
                    kid: parse_hex_16(&x.kid)?,
                    key: parse_hex_16(&x.value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut keys = KeySet {
            default_key_index: self.default_key_index.unwrap_or(0),
            ..Default::default()
        };

        if entries.len() == 1 {
            keys.default = entries.first().copied();
        } else {
            keys.rolling = entries;
        }

        Ok(keys)
    }

    fn salt(&self) -> Result<[u8; 8]> {
        match &self.salt {
            Some(salt) => {
                let salt = parse_hex(salt)?;
                salt.as_slice()
                    .try_into()
                    .map_err(|_| self.invalid(format!("salt has {} bytes, expected 8", salt.len())))
            }
            None => Ok([0; 8]),
        }
    }

    /// Encryption config of this track.
    pub fn encrypt_config(&self) -> Result<EncryptConfig> {
        let scheme = self
            .scheme()?
            .ok_or_else(|| self.invalid("missing scheme".to_owned()))?;

        let mut builder = EncryptConfig::builder(scheme, self.track_id);

        if let Some(iv_size) = self.iv_size {
            builder = builder.iv_size(iv_size);
        }

        if let Some(first_iv) = &self.first_iv {
            builder = builder.first_iv(&parse_hex(first_iv)?);
        }

        if let Some(constant_iv) = &self.constant_iv {
            builder = builder.constant_iv(&parse_hex(constant_iv)?);
        }

        if self.crypt_byte_block.is_some() || self.skip_byte_block.is_some() {
            builder = builder.pattern(
                self.crypt_byte_block.unwrap_or(0),
                self.skip_byte_block.unwrap_or(0),
            );
        }

        if let Some(clear_bytes) = self.clear_bytes {
            builder = builder.clear_bytes(clear_bytes);
        }

        if let Some(allow) = &self.allow_encrypted_slice_header {
            builder = builder.allow_encrypted_slice_header(self.parse_flag(allow)?);
        }

        if let Some(block_align) = &self.block_align {
            builder = builder.block_align(block_align.parse()?);
        }

        if let Some(placement) = &self.clear_stsd {
            builder = builder.clear_sample_description(placement.parse()?);
        }

        if let Some(uri) = &self.kms_uri {
            builder = builder.kms_uri(uri);
        }

        if let Some(uri) = &self.scheme_uri {
            builder = builder.scheme_uri(uri);
        }

        if let Some(metadata) = &self.metadata {
            builder = builder.metadata(metadata);
        }

        let mut config = builder
            .key_roll(self.key_roll.unwrap_or(0))
            .salt(self.salt()?)
            .build();

        config.track.keys = self.key_set()?;
        config.selective = SelectiveEncryption {
            mode: match &self.selective_type {
                Some(x) => x.parse()?,
                None => SelectiveMode::None,
            },
            range: self.selective_range.unwrap_or(0),
            seed: self.seed.unwrap_or(0),
        };

        if !scheme.is_pattern() && config.pattern != Pattern::none() {
            debug!(
                "Track {}: pattern ignored with {}",
                self.track_id, scheme
            );
        }

        Ok(config)
    }

    /// Decryption config of this track, `fallback` is used when the
    /// descriptor does not name a scheme.
    pub fn decrypt_config(&self, fallback: Scheme) -> Result<DecryptConfig> {
        let scheme = self.scheme()?.unwrap_or(fallback);
        let mut config = DecryptConfig::new(scheme, self.track_id).salt(self.salt()?);
        config.track.keys = self.key_set()?;
        Ok(config)
    }

    fn parse_flag(&self, value: &str) -> Result<bool> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" | "on" => Ok(true),
            "no" | "false" | "0" | "off" => Ok(false),
            _ => Err(self.invalid(format!("{} is not a boolean", value))),
        }
    }
}

/// Encrypt every track listed in a DRM descriptor file.
pub fn crypt_file<P: AsRef<Path>>(
    file: &mut dyn MediaFile,
    drm_path: P,
) -> Result<Vec<(u32, PassReport)>> {
    crypt_file_with(file, &DrmFile::load(drm_path)?)
}

/// Decrypt every protected track listed in a DRM descriptor file.
pub fn decrypt_file<P: AsRef<Path>>(
    file: &mut dyn MediaFile,
    drm_path: P,
) -> Result<Vec<(u32, PassReport)>> {
    decrypt_file_with(file, &DrmFile::load(drm_path)?)
}

pub fn crypt_file_with(file: &mut dyn MediaFile, drm: &DrmFile) -> Result<Vec<(u32, PassReport)>> {
    let supported = SupportedSchemes::default();
    let configs = drm
        .tracks
        .iter()
        .map(|x| {
            let config = x.encrypt_config()?;
            config.validate(&supported)?;
            Ok(config)
        })
        .collect::<Result<Vec<_>>>()?;
    let mut reports = Vec::with_capacity(configs.len());

    for config in configs {
        let track_id = config.track.track_id;
        let Some(track) = file.track_mut(track_id) else {
            warn!("Track {} listed in DRM descriptor not found, skipping", track_id);
            continue;
        };

        reports.push((track_id, encrypt_with_family(track, &config, None)?));
    }

    info!("Encrypted {} tracks", reports.len());
    Ok(reports)
}

pub fn decrypt_file_with(
    file: &mut dyn MediaFile,
    drm: &DrmFile,
) -> Result<Vec<(u32, PassReport)>> {
    let mut reports = Vec::new();

    for track_id in file.track_ids() {
        let Some(track) = file.track_mut(track_id) else {
            continue;
        };

        let Some(scheme) = track.protection().map(|x| x.scheme) else {
            debug!("Track {} is not protected", track_id);
            continue;
        };

        let Some(entry) = drm.track(track_id) else {
            warn!(
                "Track {} is protected with {} but has no DRM descriptor entry, skipping",
                track_id, scheme
            );
            continue;
        };

        let config = entry.decrypt_config(scheme)?;
        reports.push((track_id, decrypt_with_family(track, &config, None)?));
    }

    info!("Decrypted {} tracks", reports.len());
    Ok(reports)
}
