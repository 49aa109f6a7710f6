use crate::{CryptError, Result};
use std::{fmt, str::FromStr};

/// Protection scheme of a track, identified by the `scheme_type` of its `schm` box.
///
/// - `iAEC` (0x69414543) - ISMACryp AES-CTR
/// - `cenc` (0x63656E63) - AES-CTR full sample encryption
/// - `cbc1` (0x63626331) - AES-CBC full sample encryption
/// - `cens` (0x63656E73) - AES-CTR pattern encryption
/// - `cbcs` (0x63626373) - AES-CBC pattern encryption
/// - `adkm` (0x61646B6D) - Adobe AES-CBC encryption
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Isma,
    Cenc,
    Cbc1,
    Cens,
    Cbcs,
    Adobe,
}

/// Group of schemes handled by one top-level driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeFamily {
    /// `iAEC`, driven by `encrypt_track` / `decrypt_track`.
    Isma,
    /// `cenc` and `cens`, driven by `cenc_encrypt_track` / `cenc_decrypt_track`.
    Ctr,
    /// `cbc1` and `cbcs`, driven by `cbc_encrypt_track` / `cbc_decrypt_track`.
    Cbc,
    /// `adkm`, driven by `adobe_encrypt_track` / `adobe_decrypt_track`.
    Adobe,
}

impl Scheme {
    pub const ALL: [Scheme; 6] = [
        Scheme::Isma,
        Scheme::Cenc,
        Scheme::Cbc1,
        Scheme::Cens,
        Scheme::Cbcs,
        Scheme::Adobe,
    ];

    /// The scheme type as a 4-byte code.
    pub fn fourcc(&self) -> u32 {
        match self {
            Scheme::Isma => 0x69414543,
            Scheme::Cenc => 0x63656E63,
            Scheme::Cbc1 => 0x63626331,
            Scheme::Cens => 0x63656E73,
            Scheme::Cbcs => 0x63626373,
            Scheme::Adobe => 0x61646B6D,
        }
    }

    pub fn from_fourcc(scheme_type: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|x| x.fourcc() == scheme_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Isma => "iAEC",
            Scheme::Cenc => "cenc",
            Scheme::Cbc1 => "cbc1",
            Scheme::Cens => "cens",
            Scheme::Cbcs => "cbcs",
            Scheme::Adobe => "adkm",
        }
    }

    /// Version written in the `schm` box.
    pub fn version(&self) -> u32 {
        match self {
            Scheme::Isma | Scheme::Adobe => 1,
            _ => 0x0001_0000,
        }
    }

    pub fn family(&self) -> SchemeFamily {
        match self {
            Scheme::Isma => SchemeFamily::Isma,
            Scheme::Cenc | Scheme::Cens => SchemeFamily::Ctr,
            Scheme::Cbc1 | Scheme::Cbcs => SchemeFamily::Cbc,
            Scheme::Adobe => SchemeFamily::Adobe,
        }
    }

    /// Check if this uses CTR mode (ISMA, CENC or CENS).
    pub fn is_ctr_mode(&self) -> bool {
        matches!(self, Scheme::Isma | Scheme::Cenc | Scheme::Cens)
    }

    /// Check if this uses CBC mode (CBC1, CBCS or Adobe).
    pub fn is_cbc_mode(&self) -> bool {
        !self.is_ctr_mode()
    }

    /// Check if this uses pattern encryption (CENS or CBCS).
    pub fn is_pattern(&self) -> bool {
        matches!(self, Scheme::Cens | Scheme::Cbcs)
    }

    /// Check if this is one of the four Common Encryption schemes.
    pub fn is_cenc_family(&self) -> bool {
        matches!(
            self,
            Scheme::Cenc | Scheme::Cbc1 | Scheme::Cens | Scheme::Cbcs
        )
    }

    /// Check if per-sample protection data travels inside the samples themselves.
    pub fn is_inband(&self) -> bool {
        matches!(self, Scheme::Isma | Scheme::Adobe)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = CryptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "iaec" | "isma" => Ok(Scheme::Isma),
            "cenc" => Ok(Scheme::Cenc),
            "cbc1" => Ok(Scheme::Cbc1),
            "cens" => Ok(Scheme::Cens),
            "cbcs" => Ok(Scheme::Cbcs),
            "adkm" | "adobe" => Ok(Scheme::Adobe),
            _ => Err(CryptError::UnsupportedScheme(s.to_owned())),
        }
    }
}

/// Set of schemes a pass is allowed to use.
///
/// The default set follows the cargo features (`isma`, `cenc`, `cbc`, `adobe`)
/// this crate was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupportedSchemes(u8);

impl SupportedSchemes {
    pub fn all() -> Self {
        Self(0b11_1111)
    }

    pub fn none() -> Self {
        Self(0)
    }

    /// Schemes compiled into this build.
    pub fn compiled() -> Self {
        let mut schemes = Self::none();

        if cfg!(feature = "isma") {
            schemes = schemes.with(Scheme::Isma);
        }

        if cfg!(feature = "cenc") {
            schemes = schemes.with(Scheme::Cenc).with(Scheme::Cens);
        }

        if cfg!(feature = "cbc") {
            schemes = schemes.with(Scheme::Cbc1).with(Scheme::Cbcs);
        }

        if cfg!(feature = "adobe") {
            schemes = schemes.with(Scheme::Adobe);
        }

        schemes
    }

    pub fn with(self, scheme: Scheme) -> Self {
        Self(self.0 | Self::bit(scheme))
    }

    pub fn without(self, scheme: Scheme) -> Self {
        Self(self.0 & !Self::bit(scheme))
    }

    pub fn contains(&self, scheme: Scheme) -> bool {
        self.0 & Self::bit(scheme) != 0
    }

    pub fn check(&self, scheme: Scheme) -> Result<()> {
        if self.contains(scheme) {
            Ok(())
        } else {
            Err(CryptError::UnsupportedScheme(format!(
                "{} is disabled in this build",
                scheme
            )))
        }
    }

    fn bit(scheme: Scheme) -> u8 {
        1 << Scheme::ALL.iter().position(|x| *x == scheme).unwrap_or(0)
    }
}

impl Default for SupportedSchemes {
    fn default() -> Self {
        Self::compiled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_roundtrip() {
        for scheme in Scheme::ALL {
            assert_eq!(Scheme::from_fourcc(scheme.fourcc()), Some(scheme));
            assert_eq!(&scheme.fourcc().to_be_bytes()[..], scheme.as_str().as_bytes());
        }
        assert_eq!(Scheme::from_fourcc(0x6D703461), None);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("CBCS".parse::<Scheme>().unwrap(), Scheme::Cbcs);
        assert_eq!("iAEC".parse::<Scheme>().unwrap(), Scheme::Isma);
        assert!(matches!(
            "piff".parse::<Scheme>(),
            Err(CryptError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_supported_schemes() {
        let schemes = SupportedSchemes::all().without(Scheme::Adobe);
        assert!(schemes.contains(Scheme::Cbcs));
        assert!(!schemes.contains(Scheme::Adobe));
        assert!(matches!(
            schemes.check(Scheme::Adobe),
            Err(CryptError::UnsupportedScheme(_))
        ));
        assert!(!SupportedSchemes::none().contains(Scheme::Isma));
    }
}
