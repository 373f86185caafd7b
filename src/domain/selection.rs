//! Drag-to-select state machine for region selection
//!
//! The session is fed input events in absolute desktop coordinates and
//! reports a terminal [`SelectionOutcome`] once the gesture ends.

use super::geometry::{Point, Region};

/// Default minimum width and height of an accepted selection, in pixels.
/// Anything smaller is treated as an accidental click.
pub const DEFAULT_MIN_SELECTION_SIZE: i32 = 5;

/// Input delivered by the modal capture surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Primary button pressed
    PointerDown(Point),
    /// Pointer moved while the primary button is held
    PointerMove(Point),
    /// Primary button released
    PointerUp(Point),
    /// Escape key
    Escape,
}

/// Why a selection ended without a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Escape,
    TooSmall,
    /// Release arrived without a press (or the surface closed mid-gesture)
    NoGesture,
}

/// Terminal result of a selection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected(Region),
    Cancelled(CancelReason),
}

impl SelectionOutcome {
    pub fn region(&self) -> Option<Region> {
        match self {
            SelectionOutcome::Selected(r) => Some(*r),
            SelectionOutcome::Cancelled(_) => None,
        }
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    #[default]
    Idle,
    Pressed,
    Dragging,
    Finished(SelectionOutcome),
}

/// State of one press-drag-release gesture
#[derive(Debug, Clone)]
pub struct SelectionSession {
    phase: SelectionPhase,
    anchor: Option<Point>,
    preview: Option<Region>,
    min_size: i32,
}

impl Default for SelectionSession {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SELECTION_SIZE)
    }
}

impl SelectionSession {
    pub fn new(min_size: i32) -> Self {
        Self {
            phase: SelectionPhase::Idle,
            anchor: None,
            preview: None,
            min_size: min_size.max(1),
        }
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    /// Live rectangle between the anchor and the last pointer position
    pub fn preview(&self) -> Option<Region> {
        self.preview
    }

    pub fn outcome(&self) -> Option<SelectionOutcome> {
        match self.phase {
            SelectionPhase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Advance the state machine. Returns the outcome once a terminal state is
    /// reached; later events are ignored.
    pub fn handle(&mut self, event: InputEvent) -> Option<SelectionOutcome> {
        if let SelectionPhase::Finished(_) = self.phase {
            return None;
        }

        match event {
            InputEvent::Escape => self.finish(SelectionOutcome::Cancelled(CancelReason::Escape)),
            InputEvent::PointerDown(p) => {
                // A fresh press restarts the gesture
                self.anchor = Some(p);
                self.preview = None;
                self.phase = SelectionPhase::Pressed;
                None
            }
            InputEvent::PointerMove(p) => {
                let anchor = self.anchor?;
                self.preview = Some(Region::from_corners(anchor, p));
                self.phase = SelectionPhase::Dragging;
                None
            }
            InputEvent::PointerUp(p) => {
                let Some(anchor) = self.anchor else {
                    return self.finish(SelectionOutcome::Cancelled(CancelReason::NoGesture));
                };
                let region = Region::from_corners(anchor, p);
                if region.is_at_least(self.min_size) {
                    self.finish(SelectionOutcome::Selected(region))
                } else {
                    self.finish(SelectionOutcome::Cancelled(CancelReason::TooSmall))
                }
            }
        }
    }

    /// Abort from outside, e.g. the surface went away
    pub fn abort(&mut self) -> SelectionOutcome {
        match self.phase {
            SelectionPhase::Finished(outcome) => outcome,
            _ => {
                let outcome = SelectionOutcome::Cancelled(CancelReason::NoGesture);
                self.phase = SelectionPhase::Finished(outcome);
                outcome
            }
        }
    }

    fn finish(&mut self, outcome: SelectionOutcome) -> Option<SelectionOutcome> {
        self.phase = SelectionPhase::Finished(outcome);
        Some(outcome)
    }
}
