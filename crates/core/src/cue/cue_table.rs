use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;

use crate::{Cue, OutputId, OutputState, RawCue};

/// Reasons a cue list is rejected before a run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("cue {index} has negative offset {offset}s")]
    NegativeOffset { index: usize, offset: f64 },

    #[error("cue {index} has an offset that is not a finite duration")]
    NonFiniteOffset { index: usize },

    #[error("cue {index} references {output}, which is not an initialized output")]
    UnknownOutput { index: usize, output: OutputId },
}

/// An immutable, validated list of cues for one run, ordered by offset.
///
/// Cues sharing an offset keep their declaration order. A chase written as
/// "previous light OFF, next light ON" at the same instant relies on it.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CueTable {
    cues: Vec<Cue>,
}

impl CueTable {
    /// Validate `raw` against the outputs the driver has initialized and sort it.
    ///
    /// Performs no output calls.
    pub fn build<I, R>(raw: I, known_outputs: &[OutputId]) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RawCue>,
    {
        let known: BTreeSet<OutputId> = known_outputs.iter().copied().collect();
        let mut cues = Vec::new();

        for (index, raw) in raw.into_iter().enumerate() {
            let raw = raw.into();
            if raw.offset_secs.is_nan() || raw.offset_secs.is_infinite() {
                return Err(ValidationError::NonFiniteOffset { index });
            }
            if raw.offset_secs < 0.0 {
                return Err(ValidationError::NegativeOffset {
                    index,
                    offset: raw.offset_secs,
                });
            }
            if !known.contains(&raw.output) {
                return Err(ValidationError::UnknownOutput {
                    index,
                    output: raw.output,
                });
            }

            let offset = Duration::try_from_secs_f64(raw.offset_secs)
                .map_err(|_| ValidationError::NonFiniteOffset { index })?;

            cues.push(Cue {
                offset,
                output: raw.output,
                state: raw.state,
            });
        }

        // sort_by_key is stable
        cues.sort_by_key(|cue| cue.offset);

        Ok(Self { cues })
    }

    /// Walk every output in turn: ON for `step`, then OFF for `step`.
    pub fn walk(outputs: &[OutputId], step: Duration) -> Self {
        let mut cues = Vec::with_capacity(outputs.len() * 2);
        let mut offset = Duration::ZERO;
        for &output in outputs {
            cues.push(Cue {
                offset,
                output,
                state: OutputState::Energized,
            });
            offset += step;
            cues.push(Cue {
                offset,
                output,
                state: OutputState::DeEnergized,
            });
            offset += step;
        }
        Self { cues }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Offset of the last cue, i.e. how long the table takes to play out.
    pub fn span(&self) -> Duration {
        self.cues.last().map(|cue| cue.offset).unwrap_or(Duration::ZERO)
    }

    /// Distinct outputs referenced by the table, in ascending order.
    pub fn outputs(&self) -> Vec<OutputId> {
        let outputs: BTreeSet<OutputId> = self.cues.iter().map(|cue| cue.output).collect();
        outputs.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a CueTable {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u32 = 21;
    const B: u32 = 20;

    fn known() -> Vec<OutputId> {
        vec![OutputId(A), OutputId(B)]
    }

    #[test]
    fn test_build_sorts_by_offset() {
        let table = CueTable::build(
            vec![(2.0, B, false), (0.0, A, true), (1.0, A, false)],
            &known(),
        )
        .unwrap();

        let offsets: Vec<f64> = table.iter().map(|c| c.offset.as_secs_f64()).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 2.0]);
        assert_eq!(table.span(), Duration::from_secs(2));
    }

    #[test]
    fn test_equal_offsets_keep_declaration_order() {
        let table = CueTable::build(
            vec![(1.0, A, false), (0.5, B, false), (1.0, B, true), (0.0, A, true)],
            &known(),
        )
        .unwrap();

        let at_one: Vec<(OutputId, OutputState)> = table
            .iter()
            .filter(|c| c.offset == Duration::from_secs(1))
            .map(|c| (c.output, c.state))
            .collect();
        assert_eq!(
            at_one,
            vec![
                (OutputId(A), OutputState::DeEnergized),
                (OutputId(B), OutputState::Energized)
            ]
        );
    }

    #[test]
    fn test_negative_offset_rejected() {
        let err = CueTable::build(vec![(0.0, A, true), (-0.1, B, true)], &known()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NegativeOffset {
                index: 1,
                offset: -0.1
            }
        );
    }

    #[test]
    fn test_non_finite_offset_rejected() {
        let err = CueTable::build(vec![(f64::NAN, A, true)], &known()).unwrap_err();
        assert_eq!(err, ValidationError::NonFiniteOffset { index: 0 });
    }

    #[test]
    fn test_unknown_output_rejected() {
        let err = CueTable::build(vec![(0.0, 5, true)], &known()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownOutput {
                index: 0,
                output: OutputId(5)
            }
        );
    }

    #[test]
    fn test_empty_table() {
        let table = CueTable::build(Vec::<RawCue>::new(), &known()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.span(), Duration::ZERO);
    }

    #[test]
    fn test_multiple_cues_same_output() {
        let table = CueTable::build(
            vec![(0.0, A, true), (0.1, A, false), (0.2, A, true), (0.3, A, false)],
            &known(),
        )
        .unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.outputs(), vec![OutputId(A)]);
    }

    #[test]
    fn test_walk() {
        let table = CueTable::walk(&known(), Duration::from_millis(100));
        let steps: Vec<(u128, OutputId, OutputState)> = table
            .iter()
            .map(|c| (c.offset.as_millis(), c.output, c.state))
            .collect();
        assert_eq!(
            steps,
            vec![
                (0, OutputId(A), OutputState::Energized),
                (100, OutputId(A), OutputState::DeEnergized),
                (200, OutputId(B), OutputState::Energized),
                (300, OutputId(B), OutputState::DeEnergized),
            ]
        );
    }
}
