use mp4crypt::{
    AbortSignal, BlockAlign, ClearSampleDescription, CodecFamily, CryptError, DecryptConfig,
    EncryptConfig, MemoryTrack, ParseWarning, PassState, Sample, Scheme, SelectiveMode,
    SupportedSchemes, TrackPass,
    crypt::{AuxInfoTable, GroupDescription, SampleProtection, SubsampleEntry},
};
use std::{collections::HashSet, error::Error};

const KID: [u8; 16] = [0x11; 16];
const KEY: [u8; 16] = [0x22; 16];

fn track(count: usize, len: usize) -> MemoryTrack {
    let samples = (0..count)
        .map(|i| Sample::new(vec![i as u8; len], i % 4 == 0))
        .collect();
    MemoryTrack::new(1, CodecFamily::Other, samples)
}

fn aux_table(track: &MemoryTrack) -> Result<AuxInfoTable, Box<dyn Error>> {
    let protection = track.protection.as_ref().ok_or("track not protected")?;
    let aux_info = track.aux_info.as_ref().ok_or("missing aux info")?;
    Ok(AuxInfoTable::decode(aux_info, protection, track.samples.len())?)
}

#[test]
fn test_per_sample_ivs_unique() -> Result<(), Box<dyn Error>> {
    for scheme in [Scheme::Cenc, Scheme::Cens, Scheme::Cbc1, Scheme::Cbcs] {
        let mut track = track(300, 48);
        let config = EncryptConfig::builder(scheme, 1).key_bytes(KID, KEY).build();
        mp4crypt::encrypt_with_family(&mut track, &config, None)?;

        let table = aux_table(&track)?;
        let ivs = (0..table.len())
            .filter_map(|i| table.get(i).and_then(|x| x.iv.clone()))
            .collect::<HashSet<_>>();
        assert_eq!(ivs.len(), 300, "{}", scheme);
    }

    Ok(())
}

#[test]
fn test_key_roll_kids() -> Result<(), Box<dyn Error>> {
    let kids = [[1; 16], [2; 16], [3; 16]];
    let mut track = track(7, 32);
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .rolling_key(kids[0], [4; 16])
        .rolling_key(kids[1], [5; 16])
        .rolling_key(kids[2], [6; 16])
        .key_roll(2)
        .build();
    mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;

    let protection = track.protection.as_ref().ok_or("track not protected")?;
    assert_eq!(protection.default_kid, kids[0]);

    let table = aux_table(&track)?;
    let used = (0..table.len())
        .map(|i| table.get(i).and_then(|x| x.kid().copied()))
        .collect::<Vec<_>>();
    assert_eq!(
        used,
        [0, 0, 1, 1, 2, 2, 0].map(|x| Some(kids[x])).to_vec()
    );

    let groups = &track.aux_info.as_ref().ok_or("missing aux info")?.groups;
    assert_eq!(
        groups.descriptions,
        vec![
            GroupDescription {
                is_protected: true,
                kid: kids[1]
            },
            GroupDescription {
                is_protected: true,
                kid: kids[2]
            },
        ]
    );
    Ok(())
}

#[test]
fn test_rap_only_selection() -> Result<(), Box<dyn Error>> {
    let mut track = track(8, 64);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .key_bytes(KID, KEY)
        .selective(SelectiveMode::Rap, 0)
        .build();
    let report = mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;
    assert_eq!(report.encrypted_samples, 2);
    assert_eq!(report.clear_samples, 6);

    let table = aux_table(&track)?;
    for (i, (encrypted, clear)) in track.samples.iter().zip(&original).enumerate() {
        assert_eq!(encrypted.data != clear.data, clear.is_rap, "sample {}", i);
        assert_eq!(table.get(i).map(|x| x.is_encrypted()), Some(clear.is_rap));
    }

    assert_eq!(table.unencrypted_samples(), vec![1, 2, 3, 5, 6, 7]);
    Ok(())
}

#[test]
fn test_clear_and_clear_forced_signalling() -> Result<(), Box<dyn Error>> {
    let mut signaled = track(4, 32);
    let config = EncryptConfig::builder(Scheme::Cbcs, 1)
        .key_bytes(KID, KEY)
        .selective(SelectiveMode::Clear, 0)
        .build();
    mp4crypt::cbc_encrypt_track(&mut signaled, &config, None)?;

    let aux_info = signaled.aux_info.as_ref().ok_or("missing aux info")?;
    assert_eq!(aux_info.sample_info_sizes, vec![0; 4]);
    assert_eq!(aux_info.groups.descriptions, vec![GroupDescription::default()]);
    assert_eq!(
        aux_table(&signaled)?.get(0).map(|x| x.protection),
        Some(SampleProtection::Clear { signaled: true })
    );

    let mut forced = track(4, 32);
    let original = forced.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cbcs, 1)
        .key_bytes(KID, KEY)
        .selective(SelectiveMode::ClearForced, 0)
        .build();
    mp4crypt::cbc_encrypt_track(&mut forced, &config, None)?;

    let aux_info = forced.aux_info.as_ref().ok_or("missing aux info")?;
    assert_eq!(aux_info.sample_info_sizes, vec![0; 4]);
    assert!(aux_info.groups.is_empty());
    assert!(aux_info.groups.assignments.is_empty());
    assert_eq!(forced.samples, original);
    assert_eq!(
        aux_table(&forced)?.get(0).map(|x| x.protection),
        Some(SampleProtection::Clear { signaled: false })
    );
    Ok(())
}

#[test]
fn test_short_cbc1_sample_left_clear() -> Result<(), Box<dyn Error>> {
    let mut track = track(1, 10);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cbc1, 1).key_bytes(KID, KEY).build();
    let report = mp4crypt::cbc_encrypt_track(&mut track, &config, None)?;

    assert_eq!(report.encrypted_bytes, 0);
    assert_eq!(track.samples, original);
    assert_eq!(
        aux_table(&track)?.get(0).map(|x| x.subsamples.clone()),
        Some(vec![SubsampleEntry::new(10, 0)])
    );
    Ok(())
}

#[test]
fn test_invalid_default_key_index_touches_nothing() {
    let mut track = track(5, 32);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .rolling_key([1; 16], [2; 16])
        .rolling_key([3; 16], [4; 16])
        .default_key_index(2)
        .build();

    let mut calls = 0;
    let mut progress = |_: u64, _: u64| calls += 1;
    let result = mp4crypt::cenc_encrypt_track(&mut track, &config, Some(&mut progress));

    assert!(matches!(result, Err(CryptError::InvalidConfig(_))));
    assert_eq!(calls, 0);
    assert_eq!(track.samples, original);
    assert!(track.protection.is_none());
}

#[test]
fn test_cens_default_pattern() -> Result<(), Box<dyn Error>> {
    let mut track = track(1, 160);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cens, 1).key_bytes(KID, KEY).build();
    let report = mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;

    let data = &track.samples[0].data;
    assert_eq!(report.encrypted_bytes, 16);
    assert_ne!(data[..16], original[0].data[..16]);
    assert_eq!(data[16..], original[0].data[16..]);

    let protection = track.protection.as_ref().ok_or("track not protected")?;
    assert_eq!(
        (protection.crypt_byte_block, protection.skip_byte_block),
        (1, 9)
    );
    Ok(())
}

#[test]
fn test_strict_parsing() -> Result<(), Box<dyn Error>> {
    let codec = CodecFamily::Avc {
        nalu_length_size: 4,
    };
    // Slice NAL unit, no slice header parser available.
    let mut data = 20u32.to_be_bytes().to_vec();
    data.push(0x65);
    data.extend_from_slice(&[0; 19]);

    let mut lenient = MemoryTrack::new(1, codec, vec![Sample::new(data.clone(), true)]);
    let config = EncryptConfig::builder(Scheme::Cenc, 1).key_bytes(KID, KEY).build();
    let report = mp4crypt::cenc_encrypt_track(&mut lenient, &config, None)?;
    assert_eq!(
        report.warnings,
        vec![(0, ParseWarning::SliceHeader { offset: 0 })]
    );
    assert_eq!(report.encrypted_bytes, 24);

    let mut strict = MemoryTrack::new(1, codec, vec![Sample::new(data.clone(), true)]);
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .key_bytes(KID, KEY)
        .strict_parsing(true)
        .build();
    let result = mp4crypt::cenc_encrypt_track(&mut strict, &config, None);
    assert!(matches!(
        result,
        Err(CryptError::CodecParseFailure { sample: 0, .. })
    ));
    assert_eq!(strict.samples[0].data, data);
    Ok(())
}

#[test]
fn test_abort_before_first_sample() {
    let mut track = track(3, 32);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cenc, 1).key_bytes(KID, KEY).build();

    let signal = AbortSignal::new();
    signal.request();

    let mut pass = TrackPass::new().abort_signal(signal);
    let result = pass.encrypt(&mut track, &config);

    assert!(matches!(result, Err(CryptError::Aborted { sample: 0, .. })));
    assert_eq!(pass.state(), PassState::Aborted);
    assert_eq!(track.samples, original);
    assert!(track.protection.is_none());
}

#[test]
fn test_encrypting_twice_fails() -> Result<(), Box<dyn Error>> {
    let mut track = track(2, 32);
    let config = EncryptConfig::builder(Scheme::Cbcs, 1).key_bytes(KID, KEY).build();
    mp4crypt::cbc_encrypt_track(&mut track, &config, None)?;

    let result = mp4crypt::cbc_encrypt_track(&mut track, &config, None);
    assert!(matches!(
        result,
        Err(CryptError::AlreadyProtected {
            track_id: 1,
            scheme: Scheme::Cbcs
        })
    ));
    Ok(())
}

#[test]
fn test_disabled_scheme() {
    let mut track = track(2, 32);
    let config = EncryptConfig::builder(Scheme::Cbcs, 1).key_bytes(KID, KEY).build();
    let result = TrackPass::new()
        .supported_schemes(SupportedSchemes::all().without(Scheme::Cbcs))
        .encrypt(&mut track, &config);
    assert!(matches!(result, Err(CryptError::UnsupportedScheme(_))));
}

#[test]
fn test_wrong_key_does_not_restore() -> Result<(), Box<dyn Error>> {
    let mut track = track(2, 64);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cenc, 1).key_bytes(KID, KEY).build();
    mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;

    let decrypt = DecryptConfig::new(Scheme::Cenc, 1).key_bytes(KID, [0x33; 16]);
    mp4crypt::cenc_decrypt_track(&mut track, &decrypt, None)?;
    assert_ne!(track.samples, original);
    Ok(())
}

#[test]
fn test_progress_reports() -> Result<(), Box<dyn Error>> {
    let mut track = track(3, 32);
    let config = EncryptConfig::builder(Scheme::Cenc, 1).key_bytes(KID, KEY).build();

    let mut calls = Vec::new();
    let mut progress = |done: u64, total: u64| calls.push((done, total));
    mp4crypt::cenc_encrypt_track(&mut track, &config, Some(&mut progress))?;

    assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    Ok(())
}

#[test]
fn test_clear_bytes_cover_short_cens_sample() -> Result<(), Box<dyn Error>> {
    let mut track = track(1, 10);
    let original = track.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cens, 1)
        .key_bytes(KID, KEY)
        .clear_bytes(64)
        .build();
    let report = mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;

    assert_eq!(report.encrypted_bytes, 0);
    assert_eq!(track.samples, original);
    assert_eq!(
        aux_table(&track)?.get(0).map(|x| x.subsamples.clone()),
        Some(vec![SubsampleEntry::new(10, 0)])
    );
    Ok(())
}

#[test]
fn test_block_align() -> Result<(), Box<dyn Error>> {
    // CENC is only aligned on request.
    let mut aligned = track(1, 100);
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .key_bytes(KID, KEY)
        .clear_bytes(5)
        .block_align(BlockAlign::Always)
        .build();
    let report = mp4crypt::cenc_encrypt_track(&mut aligned, &config, None)?;
    assert_eq!(report.encrypted_bytes, 80);
    assert_eq!(
        aux_table(&aligned)?.get(0).map(|x| x.subsamples.clone()),
        Some(vec![SubsampleEntry::new(20, 80)])
    );

    // Aligning a short CENC sample leaves it clear.
    let mut short = track(1, 10);
    let original = short.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .key_bytes(KID, KEY)
        .block_align(BlockAlign::Always)
        .build();
    let report = mp4crypt::cenc_encrypt_track(&mut short, &config, None)?;
    assert_eq!(report.encrypted_bytes, 0);
    assert_eq!(short.samples, original);

    // Unaligned CBC1 signals the partial block as protected, the cipher skips it.
    let mut unaligned = track(1, 100);
    let original = unaligned.samples.clone();
    let config = EncryptConfig::builder(Scheme::Cbc1, 1)
        .key_bytes(KID, KEY)
        .clear_bytes(5)
        .block_align(BlockAlign::Never)
        .build();
    let report = mp4crypt::cbc_encrypt_track(&mut unaligned, &config, None)?;
    assert_eq!(report.encrypted_bytes, 80);
    assert_eq!(
        aux_table(&unaligned)?.get(0).map(|x| x.subsamples.clone()),
        Some(vec![SubsampleEntry::new(5, 95)])
    );
    assert_eq!(unaligned.samples[0].data[85..], original[0].data[85..]);

    let decrypt = DecryptConfig::new(Scheme::Cbc1, 1).key_bytes(KID, KEY);
    mp4crypt::cbc_decrypt_track(&mut unaligned, &decrypt, None)?;
    assert_eq!(unaligned.samples, original);
    Ok(())
}

#[test]
fn test_clear_sample_description_signalled() -> Result<(), Box<dyn Error>> {
    let mut track = track(4, 32);
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .key_bytes(KID, KEY)
        .selective(SelectiveMode::Rap, 0)
        .clear_sample_description(ClearSampleDescription::After)
        .build();
    mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;

    let protection = track.protection.as_ref().ok_or("track not protected")?;
    assert_eq!(
        protection.clear_sample_description,
        ClearSampleDescription::After
    );
    assert_eq!(protection.clear_sample_description.index(), 2);
    Ok(())
}

#[test]
fn test_mismatched_iv_size_rejected() -> Result<(), Box<dyn Error>> {
    let mut track = track(2, 64);
    let config = EncryptConfig::builder(Scheme::Cenc, 1)
        .key_bytes(KID, KEY)
        .iv_size(8)
        .build();
    mp4crypt::cenc_encrypt_track(&mut track, &config, None)?;
    let encrypted = track.samples.clone();

    if let Some(protection) = track.protection.as_mut() {
        protection.per_sample_iv_size = 16;
    }

    let decrypt = DecryptConfig::new(Scheme::Cenc, 1).key_bytes(KID, KEY);
    let result = mp4crypt::cenc_decrypt_track(&mut track, &decrypt, None);
    assert!(matches!(
        result,
        Err(CryptError::CorruptAuxInfo { sample: 0, .. })
    ));
    assert_eq!(track.samples, encrypted);
    Ok(())
}
