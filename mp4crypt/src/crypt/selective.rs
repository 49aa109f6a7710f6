use crate::{SelectiveEncryption, SelectiveMode};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Outcome of the selective encryption policy for one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleDecision {
    Encrypt,
    /// Leave the sample clear. `signaled` samples are marked as unencrypted.
    Skip { signaled: bool },
}

/// Evaluates a [`SelectiveEncryption`] policy over the samples of a track, in order.
///
/// Random policies draw from a ChaCha8 stream seeded with the configured seed,
/// so two passes with the same seed select the same samples.
pub struct SelectionPolicy {
    selective: SelectiveEncryption,
    rng: ChaCha8Rng,
    window_pick: u32,
}

impl SelectionPolicy {
    pub fn new(selective: SelectiveEncryption) -> Self {
        Self {
            selective,
            rng: ChaCha8Rng::seed_from_u64(selective.seed),
            window_pick: 0,
        }
    }

    pub fn decide(&mut self, index: usize, is_rap: bool) -> SampleDecision {
        let range = self.selective.range as usize;
        let window = range.max(1);

        let encrypt = match self.selective.mode {
            SelectiveMode::None => true,
            SelectiveMode::Rap => is_rap,
            SelectiveMode::NonRap => !is_rap,
            SelectiveMode::Random => self.rng.gen_bool(0.5),
            SelectiveMode::RandomRange => {
                if index % window == 0 {
                    self.window_pick = self.rng.gen_range(0..window as u32);
                }
                index % window == self.window_pick as usize
            }
            SelectiveMode::Range => index % window == 0,
            SelectiveMode::Preview => index >= range,
            SelectiveMode::Clear => false,
            SelectiveMode::ClearForced => {
                return SampleDecision::Skip { signaled: false };
            }
        };

        if encrypt {
            SampleDecision::Encrypt
        } else {
            SampleDecision::Skip { signaled: true }
        }
    }
}
