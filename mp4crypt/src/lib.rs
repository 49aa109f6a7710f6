#![cfg_attr(docsrs, feature(doc_cfg))]

//! This crate encrypts and decrypts the samples of mp4 tracks with
//! ISMACryp, Common Encryption (`cenc`, `cbc1`, `cens`, `cbcs`) and Adobe
//! Flash Access schemes.
//!
//! The container itself is not parsed here. Tracks are reached through the
//! [`TrackStore`] and [`MediaFile`] traits, [`MemoryTrack`] and [`MemoryFile`]
//! being in-memory implementations of them.
//!
//! # Example
//!
//! ```
//! use mp4crypt::{CodecFamily, EncryptConfig, MemoryTrack, Sample, Scheme};
//!
//! let mut track = MemoryTrack::new(
//!     1,
//!     CodecFamily::Other,
//!     vec![Sample::new(vec![0; 100], true), Sample::new(vec![1; 50], false)],
//! );
//!
//! let config = EncryptConfig::builder(Scheme::Cenc, 1)
//!     .key("eb676abbcb345e96bbcf616630f1a3da", "100b6c20940f779a4589152b57d2dacb")
//!     .unwrap()
//!     .build();
//!
//! let report = mp4crypt::cenc_encrypt_track(&mut track, &config, None).unwrap();
//! assert_eq!(report.encrypted_samples, 2);
//! ```
//!
//! # Optional Features
//!
//! The following are a list of [Cargo features](https://doc.rust-lang.org/stable/cargo/reference/features.html#the-features-section) that can be
//! enabled or disabled:
//!
//! - **isma**: Enables the ISMACryp scheme.
//! - **cenc**: Enables the `cenc` and `cens` schemes.
//! - **cbc**: Enables the `cbc1` and `cbcs` schemes.
//! - **adobe**: Enables the Adobe Flash Access scheme.
//! - **drm-file**: Enables reading xml DRM descriptor files.

pub mod crypt;

#[cfg(feature = "drm-file")]
#[cfg_attr(docsrs, doc(cfg(feature = "drm-file")))]
pub mod drm;

mod config;
mod engine;
mod error;
mod progress;
mod reader;
mod scheme;
mod store;

pub use config::*;
pub use engine::*;
pub use error::{CryptError, ParseWarning, Result};
pub use progress::{AbortSignal, ProgressSink};
pub use scheme::{Scheme, SchemeFamily, SupportedSchemes};
pub use store::*;

#[cfg(feature = "drm-file")]
pub use drm::{crypt_file, decrypt_file};
