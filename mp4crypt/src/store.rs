//! Container collaborator seen by a pass.
//!
//! A pass never parses or writes mp4 boxes itself. It reads samples and the
//! existing protection signalling through [`TrackStore`] and hands back one
//! [`TrackUpdate`] when it completes. [`MemoryTrack`] and [`MemoryFile`] are
//! in-memory implementations.

use crate::{ClearSampleDescription, CryptError, Result, Scheme, crypt::PersistedAuxInfo};
use std::fmt;

/// One media sample and its sync flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    pub data: Vec<u8>,
    /// Random access point.
    pub is_rap: bool,
}

impl Sample {
    pub fn new(data: Vec<u8>, is_rap: bool) -> Self {
        Self { data, is_rap }
    }
}

/// Codec family of a track, selects the clear prefix locator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecFamily {
    /// Length prefixed H.264 NAL units.
    Avc { nalu_length_size: u8 },
    /// Length prefixed H.265 NAL units.
    Hevc { nalu_length_size: u8 },
    /// Low overhead AV1 OBUs.
    Av1,
    Other,
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecFamily::Avc { .. } => f.write_str("avc"),
            CodecFamily::Hevc { .. } => f.write_str("hevc"),
            CodecFamily::Av1 => f.write_str("av1"),
            CodecFamily::Other => f.write_str("other"),
        }
    }
}

/// Protection signalling of a track (schm, tenc, iKMS, iSFM and adkm content).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectionInfo {
    pub scheme: Scheme,
    pub scheme_version: u32,
    pub scheme_uri: Option<String>,
    pub kms_uri: Option<String>,
    pub default_kid: [u8; 16],
    /// Size of per-sample IVs in the aux info, 0 with a constant IV.
    pub per_sample_iv_size: u8,
    pub constant_iv: Option<Vec<u8>>,
    pub crypt_byte_block: u8,
    pub skip_byte_block: u8,
    /// ISMACryp samples start with a selective encryption byte.
    pub selective_encryption: bool,
    /// ISMACryp byte stream offset length.
    pub iv_length: u8,
    pub metadata: Option<String>,
    /// Sample description used by clear samples (`force_clear_stsd_idx`).
    pub clear_sample_description: ClearSampleDescription,
}

impl ProtectionInfo {
    pub fn new(scheme: Scheme, default_kid: [u8; 16]) -> Self {
        Self {
            scheme,
            scheme_version: scheme.version(),
            scheme_uri: None,
            kms_uri: None,
            default_kid,
            per_sample_iv_size: if scheme.is_cbc_mode() { 16 } else { 8 },
            constant_iv: None,
            crypt_byte_block: 0,
            skip_byte_block: 0,
            selective_encryption: false,
            iv_length: 8,
            metadata: None,
            clear_sample_description: ClearSampleDescription::Shared,
        }
    }
}

/// Everything a completed pass writes back to its track.
#[derive(Clone, Debug)]
pub struct TrackUpdate {
    pub samples: Vec<Sample>,
    /// New protection signalling, `None` once a track is decrypted.
    pub protection: Option<ProtectionInfo>,
    /// Per-sample aux info, `None` for in-band schemes and decrypted tracks.
    pub aux_info: Option<PersistedAuxInfo>,
}

/// A single track of a container.
pub trait TrackStore {
    fn track_id(&self) -> u32;
    fn sample_count(&self) -> usize;
    fn sample(&self, index: usize) -> Result<Sample>;
    fn codec(&self) -> CodecFamily;
    fn protection(&self) -> Option<&ProtectionInfo>;
    fn aux_info(&self) -> Option<&PersistedAuxInfo>;
    /// Replace samples and signalling in one step.
    fn commit(&mut self, update: TrackUpdate) -> Result<()>;
}

/// A container with several tracks.
pub trait MediaFile {
    fn track_ids(&self) -> Vec<u32>;
    fn track_mut(&mut self, track_id: u32) -> Option<&mut dyn TrackStore>;
}

/// Track held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryTrack {
    pub track_id: u32,
    pub codec: CodecFamily,
    pub samples: Vec<Sample>,
    pub protection: Option<ProtectionInfo>,
    pub aux_info: Option<PersistedAuxInfo>,
}

impl MemoryTrack {
    pub fn new(track_id: u32, codec: CodecFamily, samples: Vec<Sample>) -> Self {
        Self {
            track_id,
            codec,
            samples,
            protection: None,
            aux_info: None,
        }
    }
}

impl TrackStore for MemoryTrack {
    fn track_id(&self) -> u32 {
        self.track_id
    }

    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        self.samples.get(index).cloned().ok_or_else(|| {
            CryptError::Container(format!(
                "track {} has no sample {} ({} samples)",
                self.track_id,
                index,
                self.samples.len()
            ))
        })
    }

    fn codec(&self) -> CodecFamily {
        self.codec
    }

    fn protection(&self) -> Option<&ProtectionInfo> {
        self.protection.as_ref()
    }

    fn aux_info(&self) -> Option<&PersistedAuxInfo> {
        self.aux_info.as_ref()
    }

    fn commit(&mut self, update: TrackUpdate) -> Result<()> {
        if update.samples.len() != self.samples.len() {
            return Err(CryptError::Container(format!(
                "track {} expects {} samples, got {}",
                self.track_id,
                self.samples.len(),
                update.samples.len()
            )));
        }

        self.samples = update.samples;
        self.protection = update.protection;
        self.aux_info = update.aux_info;
        Ok(())
    }
}

/// Container held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryFile {
    pub tracks: Vec<MemoryTrack>,
}

impl MemoryFile {
    pub fn new(tracks: Vec<MemoryTrack>) -> Self {
        Self { tracks }
    }

    pub fn track(&self, track_id: u32) -> Option<&MemoryTrack> {
        self.tracks.iter().find(|x| x.track_id == track_id)
    }
}

impl MediaFile for MemoryFile {
    fn track_ids(&self) -> Vec<u32> {
        self.tracks.iter().map(|x| x.track_id).collect()
    }

    fn track_mut(&mut self, track_id: u32) -> Option<&mut dyn TrackStore> {
        self.tracks
            .iter_mut()
            .find(|x| x.track_id == track_id)
            .map(|x| x as &mut dyn TrackStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_track_commit() {
        let mut track = MemoryTrack::new(
            1,
            CodecFamily::Other,
            vec![Sample::new(vec![1, 2], true), Sample::new(vec![3], false)],
        );
        assert_eq!(track.sample(1).unwrap().data, vec![3]);
        assert!(matches!(track.sample(2), Err(CryptError::Container(_))));

        let update = TrackUpdate {
            samples: vec![Sample::default()],
            protection: None,
            aux_info: None,
        };
        assert!(track.commit(update).is_err());
        assert_eq!(track.sample_count(), 2);
    }

    #[test]
    fn test_memory_file_lookup() {
        let mut file = MemoryFile::new(vec![
            MemoryTrack::new(1, CodecFamily::Av1, vec![]),
            MemoryTrack::new(2, CodecFamily::Other, vec![]),
        ]);
        assert_eq!(file.track_ids(), vec![1, 2]);
        assert_eq!(file.track_mut(2).map(|x| x.codec()), Some(CodecFamily::Other));
        assert!(file.track_mut(3).is_none());
    }
}
