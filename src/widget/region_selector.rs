//! Modal drag-to-select over the whole virtual desktop
//!
//! A [`SelectionBackend`] opens a borderless, nearly transparent surface
//! covering every display and grabs input. [`select_region`] pumps its
//! events through a [`SelectionSession`] and draws the live preview until
//! the gesture ends.

use crate::domain::{InputEvent, Region, SelectionOutcome, SelectionSession};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("no display available")]
    NoDisplay,
    #[error("could not create selection surface: {0}")]
    Create(String),
}

/// A full-desktop surface holding the pointer and keyboard grab
pub trait CaptureSurface {
    /// Block until the next input event. `None` when the surface was closed
    /// from outside.
    fn next_event(&mut self) -> Option<InputEvent>;

    /// Draw (or move) the border-only preview rectangle
    fn draw_preview(&mut self, region: Region);

    /// Release the grab and destroy the surface
    fn close(&mut self);
}

pub trait SelectionBackend {
    type Surface: CaptureSurface;

    /// Create the surface over `bounds` and take the input grab
    fn open(&mut self, bounds: Region) -> Result<Self::Surface, SurfaceError>;
}

/// Run one modal selection. Only failure to create the surface is an error;
/// every way the gesture can end is a [`SelectionOutcome`].
pub fn select_region<B: SelectionBackend>(
    backend: &mut B,
    display_bounds: Region,
    min_size: i32,
) -> Result<SelectionOutcome, SurfaceError> {
    if display_bounds.dimensions().is_none() {
        return Err(SurfaceError::NoDisplay);
    }

    let mut surface = backend.open(display_bounds)?;
    let mut session = SelectionSession::new(min_size);
    log::debug!("Selection surface open over {display_bounds}");

    let outcome = loop {
        let Some(event) = surface.next_event() else {
            log::debug!("Selection surface closed externally");
            break session.abort();
        };

        let before = session.preview();
        if let Some(outcome) = session.handle(event) {
            break outcome;
        }
        if let Some(preview) = session.preview().filter(|p| Some(*p) != before) {
            surface.draw_preview(preview);
        }
    };

    surface.close();
    log::debug!("Selection finished: {outcome:?}");
    Ok(outcome)
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;
    use crate::domain::{CancelReason, DEFAULT_MIN_SELECTION_SIZE, Point};

    const DESKTOP: Region = Region {
        left: -1920,
        top: 0,
        width: 3840,
        height: 1080,
    };

    fn run(events: Vec<InputEvent>) -> (SelectionOutcome, ScriptedBackend) {
        let mut backend = ScriptedBackend::new(events);
        let outcome = select_region(&mut backend, DESKTOP, DEFAULT_MIN_SELECTION_SIZE).unwrap();
        (outcome, backend)
    }

    #[test]
    fn drag_selects_and_redraws_preview() {
        let (outcome, backend) = run(vec![
            InputEvent::PointerDown(Point::new(100, 100)),
            InputEvent::PointerMove(Point::new(120, 130)),
            InputEvent::PointerMove(Point::new(120, 130)),
            InputEvent::PointerMove(Point::new(150, 160)),
            InputEvent::PointerUp(Point::new(150, 160)),
        ]);
        assert_eq!(outcome, SelectionOutcome::Selected(Region::new(100, 100, 50, 60)));

        let log = backend.log.borrow();
        assert_eq!(log.opened_over, Some(DESKTOP));
        // the repeated position does not trigger a redraw
        assert_eq!(
            log.previews,
            vec![Region::new(100, 100, 20, 30), Region::new(100, 100, 50, 60)]
        );
        assert!(log.closed);
    }

    #[test]
    fn small_drag_cancels_and_releases_grab() {
        let (outcome, backend) = run(vec![
            InputEvent::PointerDown(Point::new(100, 100)),
            InputEvent::PointerMove(Point::new(103, 104)),
            InputEvent::PointerUp(Point::new(103, 104)),
        ]);
        assert_eq!(outcome, SelectionOutcome::Cancelled(CancelReason::TooSmall));
        assert!(backend.log.borrow().closed);
    }

    #[test]
    fn escape_mid_drag_cancels() {
        let (outcome, backend) = run(vec![
            InputEvent::PointerDown(Point::new(-1500, 10)),
            InputEvent::PointerMove(Point::new(900, 1000)),
            InputEvent::Escape,
            InputEvent::PointerUp(Point::new(900, 1000)),
        ]);
        assert_eq!(outcome, SelectionOutcome::Cancelled(CancelReason::Escape));
        assert!(backend.log.borrow().closed);
    }

    #[test]
    fn surface_closed_externally_cancels() {
        let (outcome, backend) = run(vec![InputEvent::PointerDown(Point::new(0, 0))]);
        assert_eq!(outcome, SelectionOutcome::Cancelled(CancelReason::NoGesture));
        assert!(backend.log.borrow().closed);
    }

    #[test]
    fn surface_creation_failure_is_reported() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.fail = true;
        let err = select_region(&mut backend, DESKTOP, 5).unwrap_err();
        assert!(matches!(err, SurfaceError::Create(_)));

        let mut backend = ScriptedBackend::new(vec![]);
        let err = select_region(&mut backend, Region::default(), 5).unwrap_err();
        assert!(matches!(err, SurfaceError::NoDisplay));
    }
}
