//! Non-blocking outline around the stored region
//!
//! Four thin, undecorated, always-on-top edge windows trace the region's
//! border. Nothing covers the interior and no edge takes pointer input.
//! The overlay follows the host window: it disappears while the host is
//! minimized and comes back on restore if it was showing before.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::domain::Region;

/// Default edge thickness in pixels
pub const DEFAULT_BAR_THICKNESS: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("edge window no longer exists")]
    Destroyed,
    #[error("edge window backend error: {0}")]
    Backend(String),
}

/// One edge window of the outline
pub trait EdgeBar {
    fn set_geometry(&mut self, bounds: Region) -> Result<(), OverlayError>;
    fn show(&mut self) -> Result<(), OverlayError>;
    fn hide(&mut self) -> Result<(), OverlayError>;
    fn destroy(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Minimized,
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type HostObserver = Box<dyn FnMut(HostEvent)>;

/// The long-lived application window the overlay belongs to
pub trait HostWindow {
    fn subscribe(&mut self, observer: HostObserver) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Observer list for a host whose minimize/restore notifications arrive
/// from elsewhere (another thread, a test) and are handed to `dispatch`.
#[derive(Default)]
pub struct HostRelay {
    next_id: u64,
    observers: Vec<(SubscriptionId, HostObserver)>,
}

impl HostRelay {
    pub fn dispatch(&mut self, event: HostEvent) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }
}

impl HostWindow for HostRelay {
    fn subscribe(&mut self, observer: HostObserver) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.retain(|(sid, _)| *sid != id);
    }
}

/// Placement of the four edges for one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeGeometry {
    pub top: Region,
    pub bottom: Region,
    pub left: Region,
    pub right: Region,
}

impl EdgeGeometry {
    /// Thickness is clamped to the region's shorter side so no edge leaves
    /// the bounding box.
    pub fn for_region(region: Region, thickness: i32) -> Self {
        let limit = region.width.min(region.height).max(1);
        let th = thickness.clamp(1, limit);
        let Region {
            left: l,
            top: t,
            width: w,
            height: h,
        } = region;
        Self {
            top: Region::new(l, t, w, th),
            bottom: Region::new(l, t + h - th, w, th),
            left: Region::new(l, t, th, h),
            right: Region::new(l + w - th, t, th, h),
        }
    }

    /// Edges in the order top, bottom, left, right
    pub fn edges(&self) -> [Region; 4] {
        [self.top, self.bottom, self.left, self.right]
    }
}

struct OverlayState {
    region: Option<Region>,
    visible: bool,
    resume_on_restore: bool,
    thickness: i32,
    bars: [Box<dyn EdgeBar>; 4],
}

impl OverlayState {
    fn apply(&mut self, region: Region) {
        let geometry = EdgeGeometry::for_region(region, self.thickness);
        for (bar, bounds) in self.bars.iter_mut().zip(geometry.edges()) {
            // Cosmetic only
            if let Err(err) = bar.set_geometry(bounds).and_then(|()| bar.show()) {
                log::debug!("Overlay edge not placed at {bounds}: {err}");
            }
        }
    }

    fn hide_bars(&mut self) {
        for bar in &mut self.bars {
            if let Err(err) = bar.hide() {
                log::debug!("Overlay edge not hidden: {err}");
            }
        }
    }

    fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Minimized => {
                if self.visible {
                    self.hide_bars();
                    self.visible = false;
                    self.resume_on_restore = true;
                }
            }
            HostEvent::Restored => {
                if std::mem::take(&mut self.resume_on_restore) {
                    if let Some(region) = self.region {
                        self.visible = true;
                        self.apply(region);
                    }
                }
            }
        }
    }
}

type PendingEvents = Rc<RefCell<VecDeque<HostEvent>>>;

/// Apply queued host events unless the state is already borrowed further up
/// the stack; that borrower drains the queue when it lets go.
fn drain_pending(state: &RefCell<OverlayState>, pending: &RefCell<VecDeque<HostEvent>>) {
    let Ok(mut state) = state.try_borrow_mut() else {
        return;
    };
    loop {
        let next = pending.borrow_mut().pop_front();
        let Some(event) = next else {
            break;
        };
        state.on_host_event(event);
    }
}

pub struct RegionOverlay {
    state: Rc<RefCell<OverlayState>>,
    pending: PendingEvents,
    host: Rc<RefCell<dyn HostWindow>>,
    subscription: Option<SubscriptionId>,
}

impl RegionOverlay {
    /// Build the outline hidden and subscribe to the host's minimize/restore
    /// events. The subscription lives as long as the overlay.
    pub fn new(
        host: Rc<RefCell<dyn HostWindow>>,
        bars: [Box<dyn EdgeBar>; 4],
        thickness: i32,
    ) -> Self {
        let state = Rc::new(RefCell::new(OverlayState {
            region: None,
            visible: false,
            resume_on_restore: false,
            thickness: thickness.max(1),
            bars,
        }));
        state.borrow_mut().hide_bars();

        let pending = PendingEvents::default();
        let weak_state: Weak<RefCell<OverlayState>> = Rc::downgrade(&state);
        let weak_pending = Rc::downgrade(&pending);
        let subscription = host.borrow_mut().subscribe(Box::new(move |event| {
            let (Some(state), Some(pending)) = (weak_state.upgrade(), weak_pending.upgrade())
            else {
                return;
            };
            pending.borrow_mut().push_back(event);
            drain_pending(&state, &pending);
        }));

        Self {
            state,
            pending,
            host,
            subscription: Some(subscription),
        }
    }

    /// Run `f` on the state, then apply host events that arrived meanwhile
    fn update<R>(&mut self, f: impl FnOnce(&mut OverlayState) -> R) -> R {
        let result = f(&mut self.state.borrow_mut());
        drain_pending(&self.state, &self.pending);
        result
    }

    /// Store `region`, mark visible and place the edges around it
    pub fn show(&mut self, region: Region) {
        self.update(|state| {
            state.region = Some(region);
            state.visible = true;
            state.resume_on_restore = false;
            state.apply(region);
        });
    }

    /// Replace the stored region; moves the edges in place when visible
    pub fn update_region(&mut self, region: Region) {
        self.update(|state| {
            state.region = Some(region);
            if state.visible {
                state.apply(region);
            }
        });
    }

    /// Take the edges off screen. The region is kept for a later show.
    pub fn hide(&mut self) {
        self.update(|state| {
            state.visible = false;
            state.resume_on_restore = false;
            state.hide_bars();
        });
    }

    /// Show the retained region again. Returns false when there is none.
    pub fn reshow(&mut self) -> bool {
        let region = self.state.borrow().region;
        match region {
            Some(region) => {
                self.show(region);
                true
            }
            None => false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    pub fn region(&self) -> Option<Region> {
        self.state.borrow().region
    }

    /// Where the edges currently sit, if displayed
    pub fn edge_geometry(&self) -> Option<EdgeGeometry> {
        let state = self.state.borrow();
        match (state.visible, state.region) {
            (true, Some(region)) => Some(EdgeGeometry::for_region(region, state.thickness)),
            _ => None,
        }
    }

    /// Unsubscribe from the host and destroy the edge windows
    pub fn destroy(self) {}
}

impl Drop for RegionOverlay {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            match self.host.try_borrow_mut() {
                Ok(mut host) => host.unsubscribe(id),
                Err(_) => log::debug!("Host busy, overlay subscription {id:?} left behind"),
            }
        }
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.visible = false;
            for bar in &mut state.bars {
                bar.destroy();
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Default)]
    pub struct BarLog {
        pub geometry: Option<Region>,
        pub visible: bool,
        pub placements: usize,
        pub hides: usize,
        pub destroyed: bool,
        pub broken: bool,
    }

    pub struct RecordingBar(pub Rc<RefCell<BarLog>>);

    impl EdgeBar for RecordingBar {
        fn set_geometry(&mut self, bounds: Region) -> Result<(), OverlayError> {
            let mut log = self.0.borrow_mut();
            if log.broken || log.destroyed {
                return Err(OverlayError::Destroyed);
            }
            log.geometry = Some(bounds);
            log.placements += 1;
            Ok(())
        }

        fn show(&mut self) -> Result<(), OverlayError> {
            let mut log = self.0.borrow_mut();
            if log.broken || log.destroyed {
                return Err(OverlayError::Destroyed);
            }
            log.visible = true;
            Ok(())
        }

        fn hide(&mut self) -> Result<(), OverlayError> {
            let mut log = self.0.borrow_mut();
            if log.broken || log.destroyed {
                return Err(OverlayError::Destroyed);
            }
            log.visible = false;
            log.hides += 1;
            Ok(())
        }

        fn destroy(&mut self) {
            self.0.borrow_mut().destroyed = true;
        }
    }

    pub fn recording_bars() -> ([Box<dyn EdgeBar>; 4], [Rc<RefCell<BarLog>>; 4]) {
        let logs: [Rc<RefCell<BarLog>>; 4] = Default::default();
        let bars: [Box<dyn EdgeBar>; 4] = [
            Box::new(RecordingBar(logs[0].clone())),
            Box::new(RecordingBar(logs[1].clone())),
            Box::new(RecordingBar(logs[2].clone())),
            Box::new(RecordingBar(logs[3].clone())),
        ];
        (bars, logs)
    }
}
