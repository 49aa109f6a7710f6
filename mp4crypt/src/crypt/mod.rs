//! Sample level building blocks of a pass.

mod aux_info;
mod cipher;
mod clear_prefix;
mod key_roll;
mod selective;

pub mod inband;
pub mod pattern;

pub use aux_info::{
    AuxInfoTable, GroupDescription, GroupRun, PersistedAuxInfo, SampleAuxInfo, SampleGroups,
    SampleProtection, SubsampleEntry,
};
pub use cipher::BlockCipher;
pub use clear_prefix::{
    Av1Locator, AvcLocator, ClearBytes, ClearPrefixLocator, CodecContext, HevcLocator,
    NoClearPrefix, SliceHeaderParser, UnitSplit, locator_for,
};
pub use key_roll::{KeyRollState, KeySchedule, SampleKey};
pub use selective::{SampleDecision, SelectionPolicy};
