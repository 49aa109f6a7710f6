//! Locate the leading bytes of a sample that must stay clear.
//!
//! Video samples keep their non-VCL units (parameter sets, SEI, sequence
//! headers) and the length field, unit header and slice header of every slice
//! or frame in the clear so that players can parse them without a key.

use crate::{CodecFamily, ParseWarning, reader::Reader};
use std::sync::Arc;

/// Provides slice or frame header lengths, which need full bitstream parsing.
pub trait SliceHeaderParser: Send + Sync {
    /// Length of the slice header at the start of `payload`.
    ///
    /// For NAL units `payload` follows the NAL unit header. For AV1 it follows
    /// the OBU header and size field.
    fn slice_header_len(&self, codec: CodecFamily, payload: &[u8]) -> Option<usize>;
}

/// Codec state a locator needs.
#[derive(Clone)]
pub struct CodecContext {
    pub codec: CodecFamily,
    pub allow_encrypted_slice_header: bool,
    pub header_parser: Option<Arc<dyn SliceHeaderParser>>,
}

impl CodecContext {
    pub fn new(codec: CodecFamily) -> Self {
        Self {
            codec,
            allow_encrypted_slice_header: false,
            header_parser: None,
        }
    }

    fn slice_data_start(
        &self,
        sample: &[u8],
        payload_start: usize,
        unit_end: usize,
        offset: usize,
    ) -> Result<usize, ParseWarning> {
        if self.allow_encrypted_slice_header {
            return Ok(payload_start);
        }

        let parser = self
            .header_parser
            .as_ref()
            .ok_or(ParseWarning::SliceHeader { offset })?;
        let payload = &sample[payload_start..unit_end];
        let header_len = parser
            .slice_header_len(self.codec, payload)
            .ok_or(ParseWarning::SliceHeader { offset })?;

        if header_len > payload.len() {
            return Err(ParseWarning::Truncated {
                unit: "slice header",
                offset,
            });
        }

        Ok(payload_start + header_len)
    }
}

/// A clear run followed by a protectable run.
///
/// The units of a sample cover it in order, one per slice or frame. Bytes of
/// units without slice data are folded into the clear run of the next unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitSplit {
    pub clear: usize,
    pub protected: usize,
}

impl UnitSplit {
    pub fn new(clear: usize, protected: usize) -> Self {
        Self { clear, protected }
    }

    /// Single unit of a `len` bytes sample whose first `clear` bytes stay clear.
    pub fn prefix(len: usize, clear: usize) -> Self {
        let clear = clear.min(len);
        Self::new(clear, len - clear)
    }

    pub fn len(&self) -> usize {
        self.clear + self.protected
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait ClearPrefixLocator: Send + Sync {
    /// Split `sample` into units covering all of its bytes.
    fn locate_units(&self, sample: &[u8], ctx: &CodecContext)
    -> Result<Vec<UnitSplit>, ParseWarning>;

    /// Number of leading bytes of `sample` that stay clear.
    fn locate_clear_prefix(
        &self,
        sample: &[u8],
        ctx: &CodecContext,
    ) -> Result<usize, ParseWarning> {
        Ok(self
            .locate_units(sample, ctx)?
            .first()
            .map(|x| x.clear)
            .unwrap_or(0))
    }
}

/// Locator for a codec family.
pub fn locator_for(codec: CodecFamily) -> Arc<dyn ClearPrefixLocator> {
    match codec {
        CodecFamily::Avc { .. } => Arc::new(AvcLocator),
        CodecFamily::Hevc { .. } => Arc::new(HevcLocator),
        CodecFamily::Av1 => Arc::new(Av1Locator),
        CodecFamily::Other => Arc::new(NoClearPrefix),
    }
}

/// Fixed number of clear bytes, clamped to the sample length.
pub struct ClearBytes(pub u32);

impl ClearPrefixLocator for ClearBytes {
    fn locate_units(
        &self,
        sample: &[u8],
        _: &CodecContext,
    ) -> Result<Vec<UnitSplit>, ParseWarning> {
        Ok(vec![UnitSplit::prefix(sample.len(), self.0 as usize)])
    }
}

pub struct NoClearPrefix;

impl ClearPrefixLocator for NoClearPrefix {
    fn locate_units(
        &self,
        sample: &[u8],
        _: &CodecContext,
    ) -> Result<Vec<UnitSplit>, ParseWarning> {
        Ok(vec![UnitSplit::new(0, sample.len())])
    }
}

pub struct AvcLocator;

impl ClearPrefixLocator for AvcLocator {
    fn locate_units(
        &self,
        sample: &[u8],
        ctx: &CodecContext,
    ) -> Result<Vec<UnitSplit>, ParseWarning> {
        locate_nalu(sample, ctx, 1, |x| matches!(x[0] & 0x1f, 1..=5))
    }
}

pub struct HevcLocator;

impl ClearPrefixLocator for HevcLocator {
    fn locate_units(
        &self,
        sample: &[u8],
        ctx: &CodecContext,
    ) -> Result<Vec<UnitSplit>, ParseWarning> {
        locate_nalu(sample, ctx, 2, |x| (x[0] >> 1) & 0x3f < 32)
    }
}

fn locate_nalu(
    sample: &[u8],
    ctx: &CodecContext,
    header_size: usize,
    is_vcl: fn(&[u8]) -> bool,
) -> Result<Vec<UnitSplit>, ParseWarning> {
    let length_size = match ctx.codec {
        CodecFamily::Avc { nalu_length_size } | CodecFamily::Hevc { nalu_length_size } => {
            nalu_length_size as usize
        }
        _ => 4,
    };

    if !matches!(length_size, 1 | 2 | 4) {
        return Err(ParseWarning::BadLength {
            unit: "NAL unit",
            offset: 0,
        });
    }

    let mut reader = Reader::new(sample);
    let mut units = Vec::new();
    // Clear bytes since the end of the last slice data.
    let mut pending = 0;

    while reader.has_more_data() {
        let offset = reader.get_position() as usize;
        let size = reader
            .read_uint(length_size)
            .map_err(|_| ParseWarning::Truncated {
                unit: "NAL unit length",
                offset,
            })? as usize;
        let start = reader.get_position() as usize;

        if size > sample.len() - start || size < header_size {
            return Err(ParseWarning::Truncated {
                unit: "NAL unit",
                offset,
            });
        }

        let end = start + size;

        if is_vcl(&sample[start..end]) {
            let data_start = ctx.slice_data_start(sample, start + header_size, end, offset)?;
            units.push(UnitSplit::new(pending + data_start - offset, end - data_start));
            pending = 0;
        } else {
            pending += end - offset;
        }

        reader
            .skip(size as u64)
            .map_err(|_| ParseWarning::Truncated {
                unit: "NAL unit",
                offset,
            })?;
    }

    Ok(finish_units(units, pending))
}

fn finish_units(mut units: Vec<UnitSplit>, pending: usize) -> Vec<UnitSplit> {
    if pending > 0 || units.is_empty() {
        units.push(UnitSplit::new(pending, 0));
    }

    units
}

const OBU_TILE_GROUP: u8 = 4;
const OBU_FRAME: u8 = 6;

pub struct Av1Locator;

impl ClearPrefixLocator for Av1Locator {
    fn locate_units(
        &self,
        sample: &[u8],
        ctx: &CodecContext,
    ) -> Result<Vec<UnitSplit>, ParseWarning> {
        let mut reader = Reader::new(sample);
        let mut units = Vec::new();
        let mut pending = 0;

        while reader.has_more_data() {
            let offset = reader.get_position() as usize;
            let truncated = |_: std::io::Error| ParseWarning::Truncated { unit: "OBU", offset };
            let header = reader.read_u8().map_err(truncated)?;
            let obu_type = (header >> 3) & 0x0f;

            if header & 0x04 != 0 {
                reader.skip(1).map_err(truncated)?;
            }

            let size = if header & 0x02 != 0 {
                reader
                    .read_leb128()
                    .map_err(|_| ParseWarning::BadLength { unit: "OBU", offset })?
                    as usize
            } else {
                reader.remaining() as usize
            };

            let start = reader.get_position() as usize;
            if size > sample.len() - start {
                return Err(ParseWarning::Truncated { unit: "OBU", offset });
            }

            let end = start + size;

            if obu_type == OBU_FRAME || obu_type == OBU_TILE_GROUP {
                let data_start = ctx.slice_data_start(sample, start, end, offset)?;
                units.push(UnitSplit::new(pending + data_start - offset, end - data_start));
                pending = 0;
            } else {
                pending += end - offset;
            }

            reader.skip(size as u64).map_err(truncated)?;
        }

        Ok(finish_units(units, pending))
    }
}
