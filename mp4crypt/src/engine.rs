//! Track level encryption and decryption passes.
//!
//! A pass walks the samples of one track in order:
//!
//! ```text
//! clear prefix -> selective policy -> key schedule -> cipher -> aux info
//! ```
//!
//! Transformed samples are kept in memory and committed to the track in a
//! single [`TrackStore::commit`] once every sample went through. A failed or
//! aborted pass leaves the track untouched.

use crate::{
    AbortSignal, BlockAlign, CryptError, DecryptConfig, EncryptConfig, ParseWarning, Pattern,
    ProgressSink, Result, Scheme, SchemeFamily, SupportedSchemes,
    crypt::{
        AuxInfoTable, BlockCipher, ClearBytes, ClearPrefixLocator, CodecContext, KeySchedule,
        SampleAuxInfo, SampleDecision, SampleProtection, SelectionPolicy, SliceHeaderParser,
        UnitSplit, inband, locator_for,
        pattern::{self, Direction},
    },
    store::{ProtectionInfo, Sample, TrackStore, TrackUpdate},
};
use log::{debug, info, trace, warn};
use std::{collections::HashMap, sync::Arc};

/// Lifecycle of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    Idle,
    /// Config validated, key schedule and policy ready.
    Initialized,
    Running {
        sample: usize,
    },
    Completed,
    Failed,
    Aborted,
}

/// Summary of a completed pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub samples: usize,
    pub encrypted_samples: usize,
    pub clear_samples: usize,
    /// Bytes that went through the cipher.
    pub encrypted_bytes: u64,
    /// Clear prefix problems which did not stop the pass, by sample index.
    pub warnings: Vec<(usize, ParseWarning)>,
}

/// Configurable encryption or decryption pass over one track.
///
/// # Example
///
/// ```
/// use mp4crypt::{AbortSignal, CodecFamily, EncryptConfig, MemoryTrack, Sample, Scheme, TrackPass};
///
/// let mut track = MemoryTrack::new(1, CodecFamily::Other, vec![Sample::new(vec![0; 64], true)]);
/// let config = EncryptConfig::builder(Scheme::Cenc, 1)
///     .key("eb676abbcb345e96bbcf616630f1a3da", "100b6c20940f779a4589152b57d2dacb")?
///     .build();
///
/// let report = TrackPass::new()
///     .abort_signal(AbortSignal::new())
///     .encrypt(&mut track, &config)?;
/// assert_eq!(report.encrypted_samples, 1);
/// # Ok::<(), mp4crypt::CryptError>(())
/// ```
pub struct TrackPass<'a> {
    state: PassState,
    family: Option<SchemeFamily>,
    progress: Option<&'a mut dyn ProgressSink>,
    abort: Option<AbortSignal>,
    supported: SupportedSchemes,
    locator: Option<Arc<dyn ClearPrefixLocator>>,
    header_parser: Option<Arc<dyn SliceHeaderParser>>,
}

impl Default for TrackPass<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TrackPass<'a> {
    pub fn new() -> Self {
        Self {
            state: PassState::Idle,
            family: None,
            progress: None,
            abort: None,
            supported: SupportedSchemes::default(),
            locator: None,
            header_parser: None,
        }
    }

    /// Only accept schemes of one family.
    pub fn family(mut self, family: SchemeFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn progress(mut self, sink: &'a mut dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    pub fn supported_schemes(mut self, supported: SupportedSchemes) -> Self {
        self.supported = supported;
        self
    }

    /// Replace the clear prefix locator chosen from the track codec.
    pub fn with_locator(mut self, locator: Arc<dyn ClearPrefixLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_header_parser(mut self, parser: Arc<dyn SliceHeaderParser>) -> Self {
        self.header_parser = Some(parser);
        self
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    /// Protect every sample of a clear track.
    pub fn encrypt(
        &mut self,
        store: &mut dyn TrackStore,
        config: &EncryptConfig,
    ) -> Result<PassReport> {
        self.state = PassState::Idle;
        let result = self.run_encrypt(store, config);
        self.finish(&result);
        result
    }

    /// Remove the protection of a track.
    pub fn decrypt(
        &mut self,
        store: &mut dyn TrackStore,
        config: &DecryptConfig,
    ) -> Result<PassReport> {
        self.state = PassState::Idle;
        let result = self.run_decrypt(store, config);
        self.finish(&result);
        result
    }

    fn finish(&mut self, result: &Result<PassReport>) {
        self.state = match result {
            Ok(_) => PassState::Completed,
            Err(e) if e.is_aborted() => PassState::Aborted,
            Err(e) => {
                debug!("Pass failed: {}", e);
                PassState::Failed
            }
        };
    }

    fn check_family(&self, scheme: Scheme) -> Result<()> {
        if let Some(family) = self.family
            && scheme.family() != family
        {
            return Err(CryptError::InvalidConfig(format!(
                "{} is not handled by the {:?} driver",
                scheme, family
            )));
        }

        Ok(())
    }

    fn check_track(&self, store: &dyn TrackStore, track_id: u32) -> Result<()> {
        if store.track_id() != track_id {
            return Err(CryptError::InvalidConfig(format!(
                "config is for track {}, not track {}",
                track_id,
                store.track_id()
            )));
        }

        Ok(())
    }

    fn check_abort(&self, sample: usize, scheme: Scheme) -> Result<()> {
        if let Some(signal) = &self.abort
            && signal.is_requested()
        {
            warn!("Aborting {} pass before sample {}", scheme, sample);
            return Err(CryptError::Aborted { sample, scheme });
        }

        Ok(())
    }

    fn report_progress(&mut self, done: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress.report(done as u64, total as u64);
        }
    }

    fn run_encrypt(
        &mut self,
        store: &mut dyn TrackStore,
        config: &EncryptConfig,
    ) -> Result<PassReport> {
        let scheme = config.scheme();
        self.check_family(scheme)?;
        config.validate(&self.supported)?;
        self.check_track(store, config.track.track_id)?;

        if let Some(protection) = store.protection() {
            return Err(CryptError::AlreadyProtected {
                track_id: store.track_id(),
                scheme: protection.scheme,
            });
        }

        let codec = store.codec();
        let locator: Arc<dyn ClearPrefixLocator> = match config.clear_bytes {
            Some(clear_bytes) if clear_bytes > 0 => Arc::new(ClearBytes(clear_bytes)),
            _ => self.locator.clone().unwrap_or_else(|| locator_for(codec)),
        };

        let mut encryptor = SampleEncryptor {
            scheme,
            pattern: config.effective_pattern(),
            strict: config.strict_parsing,
            block_align: config.block_align,
            selective: config.selective.is_selective(),
            iv_length: config.iv_size,
            salt: config.track.salt,
            schedule: KeySchedule::new(config)?,
            policy: SelectionPolicy::new(config.selective),
            locator,
            ctx: CodecContext {
                codec,
                allow_encrypted_slice_header: config.allow_encrypted_slice_header,
                header_parser: self.header_parser.clone(),
            },
            table: AuxInfoTable::new(),
            report: PassReport::default(),
        };

        let total = store.sample_count();
        self.state = PassState::Initialized;
        info!(
            "Encrypting track {} with {} ({} samples, {} codec)",
            config.track.track_id, scheme, total, codec
        );
        debug!(
            "IV size {}, pattern {}:{}, key roll {}, selective {}",
            config.iv_size,
            encryptor.pattern.crypt_byte_block,
            encryptor.pattern.skip_byte_block,
            config.key_roll,
            config.selective.mode.code()
        );

        let mut samples = Vec::with_capacity(total);

        for i in 0..total {
            self.check_abort(i, scheme)?;
            self.state = PassState::Running { sample: i };

            let sample = store.sample(i)?;
            let is_rap = sample.is_rap;
            let data = encryptor.process(i, sample)?;
            samples.push(Sample::new(data, is_rap));

            // Completion is reported once the track is committed.
            if i + 1 < total {
                self.report_progress(i + 1, total);
            }
        }

        let keys = &config.track.keys;
        let protection = ProtectionInfo {
            scheme,
            scheme_version: scheme.version(),
            scheme_uri: config.scheme_uri.clone(),
            kms_uri: config.kms_uri.clone(),
            default_kid: keys.default_kid().unwrap_or_default(),
            per_sample_iv_size: if config.constant_iv.is_some() {
                0
            } else {
                config.iv_size
            },
            constant_iv: config.constant_iv.clone(),
            crypt_byte_block: encryptor.pattern.crypt_byte_block,
            skip_byte_block: encryptor.pattern.skip_byte_block,
            selective_encryption: encryptor.selective,
            iv_length: config.iv_size,
            metadata: config.metadata.clone(),
            clear_sample_description: config.clear_sample_description,
        };

        let aux_info = if scheme.is_cenc_family() {
            Some(encryptor.table.encode(
                scheme,
                protection.per_sample_iv_size,
                &protection.default_kid,
            )?)
        } else {
            None
        };

        store.commit(TrackUpdate {
            samples,
            protection: Some(protection),
            aux_info,
        })?;

        let report = encryptor.report;
        info!(
            "Encrypted track {}: {} of {} samples, {} bytes",
            config.track.track_id, report.encrypted_samples, report.samples, report.encrypted_bytes
        );
        self.report_progress(total, total);
        Ok(report)
    }

    fn run_decrypt(
        &mut self,
        store: &mut dyn TrackStore,
        config: &DecryptConfig,
    ) -> Result<PassReport> {
        let scheme = config.scheme();
        self.check_family(scheme)?;
        config.validate(&self.supported)?;
        self.check_track(store, config.track.track_id)?;

        let protection = store
            .protection()
            .cloned()
            .ok_or(CryptError::NotProtected(store.track_id()))?;

        if protection.scheme != scheme {
            return Err(CryptError::InvalidConfig(format!(
                "track {} is protected with {}, not {}",
                store.track_id(),
                protection.scheme,
                scheme
            )));
        }

        let total = store.sample_count();
        let table = if scheme.is_cenc_family() {
            let aux_info = store
                .aux_info()
                .ok_or_else(|| CryptError::CorruptAuxInfo {
                    sample: 0,
                    scheme,
                    reason: "missing sample auxiliary info".to_owned(),
                })?;
            AuxInfoTable::decode(aux_info, &protection, total)?
        } else {
            AuxInfoTable::new()
        };

        let mut decryptor = SampleDecryptor {
            scheme,
            pattern: if scheme.is_pattern() {
                Pattern::new(protection.crypt_byte_block, protection.skip_byte_block)
            } else {
                Pattern::none()
            },
            config,
            protection,
            table,
            ciphers: HashMap::new(),
            report: PassReport::default(),
        };

        self.state = PassState::Initialized;
        info!(
            "Decrypting track {} with {} ({} samples)",
            config.track.track_id, scheme, total
        );

        let mut samples = Vec::with_capacity(total);

        for i in 0..total {
            self.check_abort(i, scheme)?;
            self.state = PassState::Running { sample: i };

            let sample = store.sample(i)?;
            let is_rap = sample.is_rap;
            let data = decryptor.process(i, sample)?;
            samples.push(Sample::new(data, is_rap));

            // Completion is reported once the track is committed.
            if i + 1 < total {
                self.report_progress(i + 1, total);
            }
        }

        store.commit(TrackUpdate {
            samples,
            protection: None,
            aux_info: None,
        })?;

        let report = decryptor.report;
        info!(
            "Decrypted track {}: {} of {} samples",
            config.track.track_id, report.encrypted_samples, report.samples
        );
        self.report_progress(total, total);
        Ok(report)
    }
}

struct SampleEncryptor {
    scheme: Scheme,
    pattern: Pattern,
    strict: bool,
    block_align: BlockAlign,
    selective: bool,
    iv_length: u8,
    salt: [u8; 8],
    schedule: KeySchedule,
    policy: SelectionPolicy,
    locator: Arc<dyn ClearPrefixLocator>,
    ctx: CodecContext,
    table: AuxInfoTable,
    report: PassReport,
}

impl SampleEncryptor {
    fn process(&mut self, index: usize, sample: Sample) -> Result<Vec<u8>> {
        let decision = self.policy.decide(index, sample.is_rap);
        self.report.samples += 1;

        // Byte stream offsets cover clear samples too.
        let byte_offset = if self.scheme == Scheme::Isma {
            self.schedule.byte_offset(sample.data.len())
        } else {
            0
        };

        if let SampleDecision::Skip { signaled } = decision {
            trace!("Sample {} left clear (signaled: {})", index, signaled);
            self.report.clear_samples += 1;

            return Ok(match self.scheme {
                Scheme::Isma => inband::isma_clear(&sample.data),
                Scheme::Adobe => inband::adobe_clear(&sample.data),
                _ => {
                    self.table.push(SampleAuxInfo::clear(signaled));
                    sample.data
                }
            });
        }

        self.report.encrypted_samples += 1;

        match self.scheme {
            Scheme::Isma => {
                self.report.encrypted_bytes += sample.data.len() as u64;
                Ok(inband::isma_encrypt(
                    self.schedule.active_cipher(),
                    &self.salt,
                    byte_offset,
                    self.iv_length,
                    self.selective,
                    &sample.data,
                ))
            }
            Scheme::Adobe => {
                let key = self.schedule.issue(sample.data.len());
                self.report.encrypted_bytes += sample.data.len() as u64;
                inband::adobe_encrypt(self.schedule.active_cipher(), &key.iv, &sample.data)
                    .map_err(|reason| CryptError::CipherFailure {
                        sample: index,
                        scheme: self.scheme,
                        reason,
                    })
            }
            _ => self.process_cenc(index, sample.data),
        }
    }

    fn process_cenc(&mut self, index: usize, mut data: Vec<u8>) -> Result<Vec<u8>> {
        let scheme = self.scheme;

        if u32::try_from(data.len()).is_err() {
            return Err(CryptError::CipherFailure {
                sample: index,
                scheme,
                reason: format!("sample of {} bytes is too large", data.len()),
            });
        }

        let units = match self.locator.locate_units(&data, &self.ctx) {
            Ok(units) => units,
            Err(warning) if self.strict => {
                return Err(CryptError::CodecParseFailure {
                    sample: index,
                    scheme,
                    warning,
                });
            }
            Err(warning) => {
                warn!("Sample {} encrypted without clear prefix: {}", index, warning);
                self.report.warnings.push((index, warning));
                vec![UnitSplit::new(0, data.len())]
            }
        };

        let covered = units.iter().map(UnitSplit::len).sum::<usize>();
        if covered != data.len() {
            return Err(CryptError::CodecParseFailure {
                sample: index,
                scheme,
                warning: ParseWarning::BadLength {
                    unit: "clear prefix",
                    offset: covered,
                },
            });
        }

        let subsamples = pattern::plan(scheme, self.block_align, &units);
        let ranges = pattern::encrypted_ranges(data.len(), &subsamples);
        let encrypted = pattern::encrypted_len(scheme, self.pattern, &ranges);
        let key = self.schedule.issue(encrypted);

        trace!(
            "Sample {}: {} bytes, {} units, {} encrypted, key {}",
            index,
            data.len(),
            units.len(),
            encrypted,
            key.key_index
        );

        pattern::transform(
            self.schedule.active_cipher(),
            scheme,
            self.pattern,
            &key.iv,
            &mut data,
            &ranges,
            Direction::Encrypt,
        );

        self.report.encrypted_bytes += encrypted as u64;
        self.table
            .push(SampleAuxInfo::encrypted(key.kid, key.persisted_iv, subsamples));
        Ok(data)
    }
}

struct SampleDecryptor<'c> {
    scheme: Scheme,
    pattern: Pattern,
    config: &'c DecryptConfig,
    protection: ProtectionInfo,
    table: AuxInfoTable,
    ciphers: HashMap<[u8; 16], BlockCipher>,
    report: PassReport,
}

impl SampleDecryptor<'_> {
    fn cipher(&mut self, kid: &[u8; 16], sample: usize) -> Result<&BlockCipher> {
        let keys = &self.config.track.keys;
        let key = keys
            .find(kid)
            .copied()
            .or_else(|| {
                if self.scheme.is_inband() {
                    keys.default.map(|x| x.key)
                } else {
                    None
                }
            })
            .ok_or_else(|| CryptError::KeyNotFound {
                kid: hex::encode(kid),
                sample,
            })?;

        Ok(self
            .ciphers
            .entry(*kid)
            .or_insert_with(|| BlockCipher::new(&key)))
    }

    fn corrupt(&self, sample: usize, reason: String) -> CryptError {
        CryptError::CorruptAuxInfo {
            sample,
            scheme: self.scheme,
            reason,
        }
    }

    fn process(&mut self, index: usize, sample: Sample) -> Result<Vec<u8>> {
        self.report.samples += 1;
        let default_kid = self.protection.default_kid;

        match self.scheme {
            Scheme::Isma => {
                let parsed = inband::isma_parse(
                    &sample.data,
                    self.protection.selective_encryption,
                    self.protection.iv_length,
                )
                .map_err(|reason| self.corrupt(index, reason))?;
                self.count(parsed.encrypted, parsed.payload.len());

                let salt = self.config.track.salt;
                let cipher = self.cipher(&default_kid, index)?;
                Ok(inband::isma_decrypt(cipher, &salt, &parsed))
            }
            Scheme::Adobe => {
                let parsed =
                    inband::adobe_parse(&sample.data).map_err(|reason| self.corrupt(index, reason))?;
                self.count(parsed.iv.is_some(), parsed.payload.len());

                let scheme = self.scheme;
                let cipher = self.cipher(&default_kid, index)?;
                inband::adobe_decrypt(cipher, &parsed).map_err(|reason| {
                    CryptError::CipherFailure {
                        sample: index,
                        scheme,
                        reason,
                    }
                })
            }
            _ => self.process_cenc(index, sample.data),
        }
    }

    fn count(&mut self, encrypted: bool, bytes: usize) {
        if encrypted {
            self.report.encrypted_samples += 1;
            self.report.encrypted_bytes += bytes as u64;
        } else {
            self.report.clear_samples += 1;
        }
    }

    fn process_cenc(&mut self, index: usize, mut data: Vec<u8>) -> Result<Vec<u8>> {
        let info = self
            .table
            .get(index)
            .cloned()
            .ok_or_else(|| self.corrupt(index, "no aux info for sample".to_owned()))?;

        let kid = match info.protection {
            SampleProtection::Clear { .. } => {
                self.count(false, 0);
                return Ok(data);
            }
            SampleProtection::Encrypted { kid } => kid,
        };

        let iv = match (&self.protection.constant_iv, &info.iv) {
            (Some(iv), _) | (None, Some(iv)) => iv.clone(),
            (None, None) => return Err(self.corrupt(index, "missing IV".to_owned())),
        };

        if iv.len() != 8 && iv.len() != 16 {
            return Err(self.corrupt(index, format!("IV of {} bytes", iv.len())));
        }

        let mut counter_block = [0; 16];
        counter_block[..iv.len()].copy_from_slice(&iv);

        if !info.subsamples.is_empty() {
            let covered = info.subsamples.iter().map(|x| x.len()).sum::<usize>();

            if covered != data.len() {
                return Err(self.corrupt(
                    index,
                    format!(
                        "subsamples cover {} bytes of a {}-byte sample",
                        covered,
                        data.len()
                    ),
                ));
            }
        }

        let scheme = self.scheme;
        let pattern = self.pattern;
        let ranges = pattern::encrypted_ranges(data.len(), &info.subsamples);
        let encrypted = pattern::encrypted_len(scheme, pattern, &ranges);
        self.count(true, encrypted);

        let cipher = self.cipher(&kid, index)?;
        pattern::transform(
            cipher,
            scheme,
            pattern,
            &counter_block,
            &mut data,
            &ranges,
            Direction::Decrypt,
        );

        Ok(data)
    }
}

fn driver<'a>(family: SchemeFamily, progress: Option<&'a mut dyn ProgressSink>) -> TrackPass<'a> {
    let mut pass = TrackPass::new().family(family);
    pass.progress = progress;
    pass
}

/// Encrypt a track with ISMACryp (`iAEC`).
pub fn encrypt_track(
    store: &mut dyn TrackStore,
    config: &EncryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Isma, progress).encrypt(store, config)
}

/// Decrypt an ISMACryp (`iAEC`) track.
pub fn decrypt_track(
    store: &mut dyn TrackStore,
    config: &DecryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Isma, progress).decrypt(store, config)
}

/// Encrypt a track with `cenc` or `cens`.
pub fn cenc_encrypt_track(
    store: &mut dyn TrackStore,
    config: &EncryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Ctr, progress).encrypt(store, config)
}

/// Decrypt a `cenc` or `cens` track.
pub fn cenc_decrypt_track(
    store: &mut dyn TrackStore,
    config: &DecryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Ctr, progress).decrypt(store, config)
}

/// Encrypt a track with `cbc1` or `cbcs`.
pub fn cbc_encrypt_track(
    store: &mut dyn TrackStore,
    config: &EncryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Cbc, progress).encrypt(store, config)
}

/// Decrypt a `cbc1` or `cbcs` track.
pub fn cbc_decrypt_track(
    store: &mut dyn TrackStore,
    config: &DecryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Cbc, progress).decrypt(store, config)
}

/// Encrypt a track with the Adobe scheme (`adkm`).
pub fn adobe_encrypt_track(
    store: &mut dyn TrackStore,
    config: &EncryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Adobe, progress).encrypt(store, config)
}

/// Decrypt an Adobe (`adkm`) track.
pub fn adobe_decrypt_track(
    store: &mut dyn TrackStore,
    config: &DecryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    driver(SchemeFamily::Adobe, progress).decrypt(store, config)
}

/// Pick the driver of a scheme family.
pub fn encrypt_with_family(
    store: &mut dyn TrackStore,
    config: &EncryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    match config.scheme().family() {
        SchemeFamily::Isma => encrypt_track(store, config, progress),
        SchemeFamily::Ctr => cenc_encrypt_track(store, config, progress),
        SchemeFamily::Cbc => cbc_encrypt_track(store, config, progress),
        SchemeFamily::Adobe => adobe_encrypt_track(store, config, progress),
    }
}

/// Pick the driver of a scheme family.
pub fn decrypt_with_family(
    store: &mut dyn TrackStore,
    config: &DecryptConfig,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<PassReport> {
    match config.scheme().family() {
        SchemeFamily::Isma => decrypt_track(store, config, progress),
        SchemeFamily::Ctr => cenc_decrypt_track(store, config, progress),
        SchemeFamily::Cbc => cbc_decrypt_track(store, config, progress),
        SchemeFamily::Adobe => adobe_decrypt_track(store, config, progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecFamily, MemoryTrack};

    const KID: [u8; 16] = [0x11; 16];
    const KEY: [u8; 16] = [0x22; 16];

    fn track(lengths: &[usize]) -> MemoryTrack {
        MemoryTrack::new(
            1,
            CodecFamily::Other,
            lengths
                .iter()
                .enumerate()
                .map(|(i, x)| Sample::new((0..*x).map(|y| (y * 7 + i) as u8).collect(), i % 3 == 0))
                .collect(),
        )
    }

    #[test]
    fn test_state_transitions() {
        let mut track = track(&[40, 50]);
        let config = EncryptConfig::builder(Scheme::Cenc, 1)
            .key_bytes(KID, KEY)
            .build();

        let mut pass = TrackPass::new();
        assert_eq!(pass.state(), PassState::Idle);
        pass.encrypt(&mut track, &config).unwrap();
        assert_eq!(pass.state(), PassState::Completed);

        // Second encryption of the same track.
        assert!(matches!(
            pass.encrypt(&mut track, &config),
            Err(CryptError::AlreadyProtected { track_id: 1, .. })
        ));
        assert_eq!(pass.state(), PassState::Failed);
    }

    #[test]
    fn test_family_mismatch() {
        let mut track = track(&[40]);
        let config = EncryptConfig::builder(Scheme::Cbcs, 1)
            .key_bytes(KID, KEY)
            .build();
        assert!(matches!(
            cenc_encrypt_track(&mut track, &config, None),
            Err(CryptError::InvalidConfig(_))
        ));
        assert!(track.protection.is_none());
    }

    #[test]
    fn test_decrypt_clear_track() {
        let mut track = track(&[40]);
        let config = DecryptConfig::new(Scheme::Cenc, 1).key_bytes(KID, KEY);
        assert!(matches!(
            cenc_decrypt_track(&mut track, &config, None),
            Err(CryptError::NotProtected(1))
        ));
    }

    #[test]
    fn test_abort_leaves_track_untouched() {
        let mut track = track(&[40, 50, 60]);
        let original = track.samples.clone();
        let config = EncryptConfig::builder(Scheme::Cenc, 1)
            .key_bytes(KID, KEY)
            .build();

        let signal = AbortSignal::new();
        let trigger = signal.clone();
        let mut progress = |done: u64, _: u64| {
            if done == 1 {
                trigger.request();
            }
        };

        let mut pass = TrackPass::new()
            .abort_signal(signal)
            .progress(&mut progress);
        let result = pass.encrypt(&mut track, &config);
        assert!(matches!(result, Err(CryptError::Aborted { sample: 1, .. })));
        assert_eq!(pass.state(), PassState::Aborted);
        assert_eq!(track.samples, original);
        assert!(track.protection.is_none());
    }

    #[test]
    fn test_missing_key_on_decrypt() {
        let mut track = track(&[40]);
        let config = EncryptConfig::builder(Scheme::Cenc, 1)
            .key_bytes(KID, KEY)
            .build();
        cenc_encrypt_track(&mut track, &config, None).unwrap();

        let config = DecryptConfig::new(Scheme::Cenc, 1).key_bytes([0x33; 16], KEY);
        assert!(matches!(
            cenc_decrypt_track(&mut track, &config, None),
            Err(CryptError::KeyNotFound { sample: 0, .. })
        ));
    }

    #[test]
    fn test_corrupt_subsamples() {
        let mut track = track(&[40]);
        let config = EncryptConfig::builder(Scheme::Cenc, 1)
            .key_bytes(KID, KEY)
            .clear_bytes(8)
            .build();
        cenc_encrypt_track(&mut track, &config, None).unwrap();
        track.samples[0].data.push(0);

        let config = DecryptConfig::new(Scheme::Cenc, 1).key_bytes(KID, KEY);
        assert!(matches!(
            cenc_decrypt_track(&mut track, &config, None),
            Err(CryptError::CorruptAuxInfo { sample: 0, .. })
        ));
    }

    #[test]
    fn test_progress_reaches_total() {
        let mut track = track(&[16, 17, 18]);
        let config = EncryptConfig::builder(Scheme::Cbc1, 1)
            .key_bytes(KID, KEY)
            .build();

        let mut calls = Vec::new();
        let mut progress = |done: u64, total: u64| calls.push((done, total));
        cbc_encrypt_track(&mut track, &config, Some(&mut progress)).unwrap();
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);

        let config = DecryptConfig::new(Scheme::Cbc1, 1).key_bytes(KID, KEY);
        let mut calls = Vec::new();
        let mut progress = |done: u64, total: u64| calls.push((done, total));
        cbc_decrypt_track(&mut track, &config, Some(&mut progress)).unwrap();
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
