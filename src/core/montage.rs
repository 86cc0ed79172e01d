//! core/montage.rs — fixed linear projection of a multi-channel window down
//! to the scalar signal of interest.

use thiserror::Error;

use crate::core::ring::Window;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MontageError {
    #[error("no electrodes of interest configured")]
    Empty,
    #[error("electrode index {index} out of range for {channels} channels")]
    OutOfBounds { index: usize, channels: usize },
    #[error("bipolar reference channel {reference} collides with the signal channel")]
    ReferenceCollision { reference: usize },
}

/// Channel-selection policy, resolved and bounds-checked once at
/// configuration time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Montage {
    /// Signal channel minus a designated reference channel.
    Bipolar { signal: usize, reference: usize },
    /// First listed channel minus the arithmetic mean of the remaining
    /// listed channels.
    LocalAverage { signal: usize, refs: Vec<usize> },
}

impl Montage {
    /// One electrode selects a bipolar derivation against the last recorded
    /// channel; several select a local average reference.
    pub fn from_electrodes(electrodes: &[usize], channels: usize) -> Result<Self, MontageError> {
        if electrodes.is_empty() {
            return Err(MontageError::Empty);
        }
        for &e in electrodes {
            if e >= channels {
                return Err(MontageError::OutOfBounds {
                    index: e,
                    channels,
                });
            }
        }
        if electrodes.len() == 1 {
            let signal = electrodes[0];
            let reference = channels - 1;
            if reference == signal {
                return Err(MontageError::ReferenceCollision { reference });
            }
            Ok(Self::Bipolar { signal, reference })
        } else {
            Ok(Self::LocalAverage {
                signal: electrodes[0],
                refs: electrodes[1..].to_vec(),
            })
        }
    }

    /// Reduce a C x L window to an L-length series. Stateless; recomputed
    /// fresh per window.
    pub fn project(&self, window: &Window) -> Vec<f32> {
        match self {
            Self::Bipolar { signal, reference } => {
                debug_assert!(*signal < window.channels() && *reference < window.channels());
                let sig = window.channel(*signal);
                let refc = window.channel(*reference);
                sig.iter().zip(refc).map(|(s, r)| s - r).collect()
            }
            Self::LocalAverage { signal, refs } => {
                debug_assert!(*signal < window.channels());
                let sig = window.channel(*signal);
                let scale = 1.0 / refs.len() as f32;
                let mut out = sig.to_vec();
                for &r in refs {
                    let refc = window.channel(r);
                    for (o, v) in out.iter_mut().zip(refc) {
                        *o -= v * scale;
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ring::SampleRing;

    fn window_from_rows(rows: &[&[f32]]) -> Window {
        let channels = rows.len();
        let len = rows[0].len();
        let mut ring = SampleRing::new(channels, len, 1);
        for i in 0..len {
            let frame: Vec<f32> = rows.iter().map(|r| r[i]).collect();
            ring.push(&frame, i as f64);
        }
        ring.window(len).unwrap()
    }

    #[test]
    fn single_electrode_is_bipolar_against_last_channel() {
        let m = Montage::from_electrodes(&[0], 3).unwrap();
        assert_eq!(
            m,
            Montage::Bipolar {
                signal: 0,
                reference: 2
            }
        );
        let w = window_from_rows(&[&[5.0, 6.0], &[0.0, 0.0], &[1.0, 2.0]]);
        assert_eq!(m.project(&w), vec![4.0, 4.0]);
    }

    #[test]
    fn multiple_electrodes_use_local_average_reference() {
        let m = Montage::from_electrodes(&[1, 0, 2], 4).unwrap();
        let w = window_from_rows(&[
            &[2.0, 4.0],  // ch0, referenced
            &[10.0, 8.0], // ch1, signal
            &[4.0, 0.0],  // ch2, referenced
            &[99.0, 99.0],
        ]);
        // 10 - (2+4)/2 = 7, 8 - (4+0)/2 = 6
        assert_eq!(m.project(&w), vec![7.0, 6.0]);
    }

    #[test]
    fn bounds_are_checked_at_construction() {
        assert_eq!(
            Montage::from_electrodes(&[4], 4),
            Err(MontageError::OutOfBounds {
                index: 4,
                channels: 4
            })
        );
        assert_eq!(Montage::from_electrodes(&[], 4), Err(MontageError::Empty));
        assert_eq!(
            Montage::from_electrodes(&[3], 4),
            Err(MontageError::ReferenceCollision { reference: 3 })
        );
    }
}
