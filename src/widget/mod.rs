//! On-screen pieces: the modal region selector, the region outline and the
//! eframe windows that host them

pub mod desktop;
pub mod region_overlay;
pub mod region_selector;
