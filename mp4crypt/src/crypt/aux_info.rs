//! Per-sample auxiliary information of Common Encryption tracks.
//!
//! During encryption every sample pushes one [`SampleAuxInfo`] into an
//! [`AuxInfoTable`]. At the end of the pass the table is encoded into
//! [`PersistedAuxInfo`], which mirrors what an mp4 writer stores:
//!
//! - `sample_info_sizes` like `saiz`, 0 for an unencrypted sample
//! - `data` like the body of `senc`: IV, u16 subsample count, then
//!   `u16 clear / u32 encrypted` pairs, all big-endian
//! - [`SampleGroups`] like `sgpd`/`sbgp` with `seig` entries, for samples whose
//!   KID or protection differs from the track default
//!
//! Decryption decodes the same structures back into a table.

use crate::{CryptError, Result, Scheme, reader::Reader, store::ProtectionInfo};

/// Entry describing a subsample's clear and encrypted portions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleEntry {
    /// Number of clear bytes at the start of the subsample.
    pub bytes_of_clear_data: u16,
    /// Number of protected bytes following the clear bytes.
    pub bytes_of_encrypted_data: u32,
}

impl SubsampleEntry {
    pub fn new(bytes_of_clear_data: u16, bytes_of_encrypted_data: u32) -> Self {
        Self {
            bytes_of_clear_data,
            bytes_of_encrypted_data,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes_of_clear_data as usize + self.bytes_of_encrypted_data as usize
    }
}

/// Protection state of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleProtection {
    Encrypted { kid: [u8; 16] },
    /// `signaled` samples are listed in the unencrypted sample group.
    Clear { signaled: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleAuxInfo {
    /// Persisted IV, absent for clear samples and constant IV tracks.
    pub iv: Option<Vec<u8>>,
    /// Empty when the whole sample is protected.
    pub subsamples: Vec<SubsampleEntry>,
    pub protection: SampleProtection,
}

impl SampleAuxInfo {
    pub fn encrypted(kid: [u8; 16], iv: Option<Vec<u8>>, subsamples: Vec<SubsampleEntry>) -> Self {
        Self {
            iv,
            subsamples,
            protection: SampleProtection::Encrypted { kid },
        }
    }

    pub fn clear(signaled: bool) -> Self {
        Self {
            iv: None,
            subsamples: Vec::new(),
            protection: SampleProtection::Clear { signaled },
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.protection, SampleProtection::Encrypted { .. })
    }

    pub fn kid(&self) -> Option<&[u8; 16]> {
        match &self.protection {
            SampleProtection::Encrypted { kid } => Some(kid),
            SampleProtection::Clear { .. } => None,
        }
    }

    fn encoded_size(&self) -> usize {
        if self.is_encrypted() {
            self.iv.as_ref().map(|x| x.len()).unwrap_or(0) + 2 + 6 * self.subsamples.len()
        } else {
            0
        }
    }
}

/// `seig`-like sample group description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDescription {
    pub is_protected: bool,
    pub kid: [u8; 16],
}

/// Run of consecutive samples mapped to one group description.
///
/// `group_index` is 1-based, 0 means the track defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRun {
    pub sample_count: u32,
    pub group_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleGroups {
    pub descriptions: Vec<GroupDescription>,
    pub assignments: Vec<GroupRun>,
}

impl SampleGroups {
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    fn assign(&mut self, description: Option<GroupDescription>) {
        let group_index = match description {
            Some(description) => {
                match self.descriptions.iter().position(|x| *x == description) {
                    Some(position) => position as u32 + 1,
                    None => {
                        self.descriptions.push(description);
                        self.descriptions.len() as u32
                    }
                }
            }
            None => 0,
        };

        match self.assignments.last_mut() {
            Some(run) if run.group_index == group_index => run.sample_count += 1,
            _ => self.assignments.push(GroupRun {
                sample_count: 1,
                group_index,
            }),
        }
    }

    /// Group description of every sample, `None` for the track defaults.
    fn expand(
        &self,
        sample_count: usize,
    ) -> std::result::Result<Vec<Option<&GroupDescription>>, (usize, String)> {
        let mut groups = Vec::with_capacity(sample_count);

        for run in &self.assignments {
            let description = match run.group_index {
                0 => None,
                x => Some(self.descriptions.get(x as usize - 1).ok_or_else(|| {
                    (
                        groups.len(),
                        format!(
                            "group index {} out of range for {} descriptions",
                            x,
                            self.descriptions.len()
                        ),
                    )
                })?),
            };

            for _ in 0..run.sample_count {
                if groups.len() == sample_count {
                    return Err((
                        sample_count,
                        "sample group assignments overrun the track".to_owned(),
                    ));
                }
                groups.push(description);
            }
        }

        groups.resize(sample_count, None);
        Ok(groups)
    }
}

/// Auxiliary information as persisted next to the samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedAuxInfo {
    pub per_sample_iv_size: u8,
    pub sample_info_sizes: Vec<u8>,
    pub data: Vec<u8>,
    pub groups: SampleGroups,
}

/// Sample auxiliary information table, one entry per sample.
#[derive(Debug, Clone, Default)]
pub struct AuxInfoTable {
    samples: Vec<SampleAuxInfo>,
}

impl AuxInfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, info: SampleAuxInfo) {
        self.samples.push(info);
    }

    pub fn get(&self, index: usize) -> Option<&SampleAuxInfo> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples listed in the unencrypted sample group.
    pub fn unencrypted_samples(&self) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, x)| x.protection == SampleProtection::Clear { signaled: true })
            .map(|(i, _)| i)
            .collect()
    }

    /// Encode the table against the track default KID.
    pub fn encode(
        &self,
        scheme: Scheme,
        per_sample_iv_size: u8,
        default_kid: &[u8; 16],
    ) -> Result<PersistedAuxInfo> {
        let mut persisted = PersistedAuxInfo {
            per_sample_iv_size,
            ..Default::default()
        };

        for (i, sample) in self.samples.iter().enumerate() {
            let size = u8::try_from(sample.encoded_size()).map_err(|_| {
                CryptError::CorruptAuxInfo {
                    sample: i,
                    scheme,
                    reason: format!(
                        "{} subsamples do not fit in one aux info entry",
                        sample.subsamples.len()
                    ),
                }
            })?;
            persisted.sample_info_sizes.push(size);

            let description = match sample.protection {
                SampleProtection::Encrypted { kid } => {
                    if let Some(iv) = &sample.iv {
                        if iv.len() != per_sample_iv_size as usize {
                            return Err(CryptError::CorruptAuxInfo {
                                sample: i,
                                scheme,
                                reason: format!(
                                    "IV of {} bytes on a track with {}-byte IVs",
                                    iv.len(),
                                    per_sample_iv_size
                                ),
                            });
                        }
                        persisted.data.extend_from_slice(iv);
                    }

                    persisted
                        .data
                        .extend_from_slice(&(sample.subsamples.len() as u16).to_be_bytes());

                    for subsample in &sample.subsamples {
                        persisted
                            .data
                            .extend_from_slice(&subsample.bytes_of_clear_data.to_be_bytes());
                        persisted
                            .data
                            .extend_from_slice(&subsample.bytes_of_encrypted_data.to_be_bytes());
                    }

                    (kid != *default_kid).then_some(GroupDescription {
                        is_protected: true,
                        kid,
                    })
                }
                SampleProtection::Clear { signaled: true } => Some(GroupDescription::default()),
                SampleProtection::Clear { signaled: false } => None,
            };

            persisted.groups.assign(description);
        }

        if persisted.groups.is_empty() {
            persisted.groups.assignments.clear();
        }

        Ok(persisted)
    }

    /// Decode persisted aux info of a track with `sample_count` samples.
    pub fn decode(
        aux: &PersistedAuxInfo,
        protection: &ProtectionInfo,
        sample_count: usize,
    ) -> Result<Self> {
        let scheme = protection.scheme;
        let corrupt = |sample: usize, reason: String| CryptError::CorruptAuxInfo {
            sample,
            scheme,
            reason,
        };

        if aux.sample_info_sizes.len() != sample_count {
            return Err(corrupt(
                aux.sample_info_sizes.len().min(sample_count),
                format!(
                    "{} aux info sizes for {} samples",
                    aux.sample_info_sizes.len(),
                    sample_count
                ),
            ));
        }

        // A constant IV track persists no per-sample IV.
        let expected_iv_size = if protection.constant_iv.is_some() {
            0
        } else {
            protection.per_sample_iv_size
        };

        if aux.per_sample_iv_size != expected_iv_size
            || protection.per_sample_iv_size != expected_iv_size
        {
            return Err(corrupt(
                0,
                format!(
                    "aux info IV size {} does not match signalled IV size {}",
                    aux.per_sample_iv_size, protection.per_sample_iv_size
                ),
            ));
        }

        let groups = aux
            .groups
            .expand(sample_count)
            .map_err(|(sample, reason)| corrupt(sample, reason))?;
        let iv_size = aux.per_sample_iv_size as usize;
        let mut reader = Reader::new(&aux.data);
        let mut table = Self::new();

        for (i, (size, group)) in aux.sample_info_sizes.iter().zip(groups).enumerate() {
            if *size == 0 {
                if group.is_some_and(|x| x.is_protected) {
                    return Err(corrupt(
                        i,
                        "protected sample group without aux info".to_owned(),
                    ));
                }

                table.push(SampleAuxInfo::clear(group.is_some()));
                continue;
            }

            if group.is_some_and(|x| !x.is_protected) {
                return Err(corrupt(
                    i,
                    "unencrypted sample group with aux info".to_owned(),
                ));
            }

            let kid = group.map(|x| x.kid).unwrap_or(protection.default_kid);
            let iv = if iv_size > 0 {
                Some(
                    reader
                        .read_bytes_u8(iv_size)
                        .map_err(|x| corrupt(i, format!("cannot read IV ({})", x)))?,
                )
            } else {
                None
            };

            let subsample_count = reader
                .read_u16()
                .map_err(|x| corrupt(i, format!("cannot read subsample count ({})", x)))?;

            if *size as usize != iv_size + 2 + 6 * subsample_count as usize {
                return Err(corrupt(
                    i,
                    format!(
                        "aux info size {} does not match {} subsamples",
                        size, subsample_count
                    ),
                ));
            }

            let mut subsamples = Vec::with_capacity(subsample_count as usize);

            for _ in 0..subsample_count {
                let clear = reader.read_u16();
                let encrypted = reader.read_u32();

                match (clear, encrypted) {
                    (Ok(clear), Ok(encrypted)) => {
                        subsamples.push(SubsampleEntry::new(clear, encrypted))
                    }
                    _ => return Err(corrupt(i, "truncated subsample entry".to_owned())),
                }
            }

            table.push(SampleAuxInfo::encrypted(kid, iv, subsamples));
        }

        if reader.has_more_data() {
            return Err(corrupt(
                sample_count,
                format!("{} trailing aux info bytes", reader.remaining()),
            ));
        }

        Ok(table)
    }
}
