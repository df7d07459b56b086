//! Guided tuning traversal.
//!
//! Walks a loaded stretch curve note by note in a physically sensible
//! order: start at the instrument's middle and radiate outward. Forward
//! and backward navigation map directly onto the next/previous controls of
//! whatever front end drives this, including their enabled/disabled state.

use log::info;

use crate::curve::PartialsMapping;
use crate::notes::{self, REFERENCE_NOTES};
use crate::partials::PartialSet;

/// The traversal pivot: tuning begins at middle C.
pub const TRAVERSAL_START: &str = "C4";

/// Note order for the tuning pass: the reference table rotated to start at
/// C4, continuing to the end, then the remaining lower notes in descending
/// order. Filtered to the notes the loaded curve actually contains, each at
/// most once.
pub fn traversal_order(mapping: &PartialsMapping) -> Vec<&'static str> {
    let names: Vec<&'static str> = REFERENCE_NOTES.iter().map(|n| n.name).collect();
    let pivot = names
        .iter()
        .position(|&n| n == TRAVERSAL_START)
        .unwrap_or(0);

    names[pivot..]
        .iter()
        .chain(names[..pivot].iter().rev())
        .copied()
        .filter(|name| mapping.contains(name))
        .collect()
}

/// The note under the tuner's hands: name, nominal pitch, and the measured
/// partials to tune against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteStep {
    pub note: &'static str,
    pub nominal_hz: f32,
    pub partials: PartialSet,
}

/// What a navigation call landed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuningStep {
    Note(NoteStep),
    /// Every note in the traversal has been visited.
    Complete,
}

/// State machine over the traversal order.
///
/// Loading a mapping is the Unloaded -> Ready transition; Complete is
/// terminal until a new mapping is loaded.
#[derive(Debug, Clone)]
pub struct TuningTraversal {
    steps: Vec<NoteStep>,
    position: usize,
    complete: bool,
}

impl TuningTraversal {
    /// Builds the traversal for a loaded mapping, positioned on the first
    /// note. An empty mapping loads directly as Complete.
    pub fn load(mapping: &PartialsMapping) -> Self {
        let steps: Vec<NoteStep> = traversal_order(mapping)
            .into_iter()
            .filter_map(|name| {
                Some(NoteStep {
                    note: name,
                    nominal_hz: notes::nominal_frequency(name)?,
                    partials: *mapping.get(name)?,
                })
            })
            .collect();

        info!("tuning traversal loaded with {} notes", steps.len());
        let complete = steps.is_empty();
        Self {
            steps,
            position: 0,
            complete,
        }
    }

    /// The step at the current position.
    pub fn current(&self) -> TuningStep {
        if self.complete {
            TuningStep::Complete
        } else {
            TuningStep::Note(self.steps[self.position])
        }
    }

    /// Moves forward one note; past the last note the traversal becomes
    /// Complete and stays there.
    pub fn advance(&mut self) -> TuningStep {
        if !self.complete {
            if self.position + 1 < self.steps.len() {
                self.position += 1;
            } else {
                self.complete = true;
                info!("tuning traversal complete");
            }
        }
        self.current()
    }

    /// Moves back one note; a no-op at the first note and once Complete.
    pub fn retreat(&mut self) -> TuningStep {
        if !self.complete && self.position > 0 {
            self.position -= 1;
        }
        self.current()
    }

    /// Whether the forward control should be enabled.
    pub fn can_advance(&self) -> bool {
        !self.complete
    }

    /// Whether the backward control should be enabled.
    pub fn can_retreat(&self) -> bool {
        !self.complete && self.position > 0
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
