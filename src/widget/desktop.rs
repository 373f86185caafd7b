//! Desktop front end on eframe
//!
//! eframe owns the main thread and draws three kinds of window: the control
//! window (action buttons over the console), the full-desktop selection
//! surface and the four edge windows of the region outline. [`App`] runs on
//! a worker thread and the two sides only talk over channels: the worker
//! asks for surfaces and edge placements, the window thread answers with
//! pointer input, minimize/restore and button presses.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use eframe::egui;

use crate::core::app::App;
use crate::core::console::{Console, Tag};
use crate::domain::{InputEvent, Point, Region};
use crate::widget::region_overlay::{EdgeBar, HostEvent, HostRelay, OverlayError, RegionOverlay};
use crate::widget::region_selector::{CaptureSurface, SelectionBackend, SurfaceError};

const APP_TITLE: &str = "ocrbox";
const REPAINT_INTERVAL: Duration = Duration::from_millis(16);
/// Console lines kept in the control window
const CONSOLE_LINES: usize = 500;
const EDGE_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 48, 48);
const SHADE: egui::Color32 = egui::Color32::from_rgba_premultiplied(0, 0, 0, 60);
const GONE: &str = "window thread is gone";

/// Worker to window thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiRequest {
    OpenSelection(Region),
    Preview(Region),
    CloseSelection,
    Edge(usize, EdgeChange),
    ConsoleLine(String),
    OverlayEnabled(bool),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeChange {
    Place(Region),
    Show,
    Hide,
    Destroy,
}

/// Window thread to worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    SelectRegion,
    Ocr,
    Ask,
    SetOverlay(bool),
    ApplySettings,
    ProbeChat,
    Host(HostEvent),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Control window with every action and the outline attached
    Interactive,
    /// One selection, then exit
    SelectOnce,
}

pub type AppFactory = Box<dyn FnOnce(Console) -> App + Send>;

// ---------- Worker side ----------

/// Selection surfaces drawn by the window thread
pub struct ChannelSelection {
    requests: Sender<UiRequest>,
    input: Receiver<InputEvent>,
}

impl SelectionBackend for ChannelSelection {
    type Surface = ChannelSurface;

    fn open(&mut self, bounds: Region) -> Result<ChannelSurface, SurfaceError> {
        // Clicks that reached an earlier surface after it closed
        while self.input.try_recv().is_ok() {}
        self.requests
            .send(UiRequest::OpenSelection(bounds))
            .map_err(|_| SurfaceError::Create(GONE.to_string()))?;
        Ok(ChannelSurface {
            requests: self.requests.clone(),
            input: self.input.clone(),
            open: true,
        })
    }
}

pub struct ChannelSurface {
    requests: Sender<UiRequest>,
    input: Receiver<InputEvent>,
    open: bool,
}

impl CaptureSurface for ChannelSurface {
    fn next_event(&mut self) -> Option<InputEvent> {
        self.input.recv().ok()
    }

    fn draw_preview(&mut self, region: Region) {
        if self.requests.send(UiRequest::Preview(region)).is_err() {
            log::debug!("Preview {region} dropped, {GONE}");
        }
    }

    fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            let _ = self.requests.send(UiRequest::CloseSelection);
        }
    }
}

impl Drop for ChannelSurface {
    fn drop(&mut self) {
        self.close();
    }
}

/// One outline edge, drawn as a viewport by the window thread
pub struct ChannelBar {
    index: usize,
    requests: Sender<UiRequest>,
    destroyed: bool,
}

impl ChannelBar {
    fn send(&self, change: EdgeChange) -> Result<(), OverlayError> {
        if self.destroyed {
            return Err(OverlayError::Destroyed);
        }
        self.requests
            .send(UiRequest::Edge(self.index, change))
            .map_err(|_| OverlayError::Backend(GONE.to_string()))
    }
}

impl EdgeBar for ChannelBar {
    fn set_geometry(&mut self, bounds: Region) -> Result<(), OverlayError> {
        self.send(EdgeChange::Place(bounds))
    }

    fn show(&mut self) -> Result<(), OverlayError> {
        self.send(EdgeChange::Show)
    }

    fn hide(&mut self) -> Result<(), OverlayError> {
        self.send(EdgeChange::Hide)
    }

    fn destroy(&mut self) {
        if let Err(err) = self.send(EdgeChange::Destroy) {
            log::debug!("Edge {} not destroyed: {err}", self.index);
        }
        self.destroyed = true;
    }
}

pub fn edge_bars(requests: &Sender<UiRequest>) -> [Box<dyn EdgeBar>; 4] {
    std::array::from_fn(|index| {
        Box::new(ChannelBar {
            index,
            requests: requests.clone(),
            destroyed: false,
        }) as Box<dyn EdgeBar>
    })
}

/// Console lines go to stdout and to the control window
pub fn window_console(requests: Sender<UiRequest>) -> Console {
    Console::new(Box::new(move |line| {
        println!("{line}");
        let _ = requests.send(UiRequest::ConsoleLine(line.to_string()));
    }))
}

pub struct WorkerChannels {
    pub requests: Sender<UiRequest>,
    pub commands: Receiver<UiCommand>,
    pub input: Receiver<InputEvent>,
}

/// Drive `app` from window commands until the window closes or asks to
/// quit, then save and tell the window to close.
pub fn run_worker(mut app: App, mode: Mode, channels: WorkerChannels) -> anyhow::Result<()> {
    let WorkerChannels {
        requests,
        commands,
        input,
    } = channels;
    let mut selection = ChannelSelection {
        requests: requests.clone(),
        input,
    };
    let host = Rc::new(RefCell::new(HostRelay::default()));

    let result = match mode {
        Mode::SelectOnce => app.action_select_region(&mut selection).map(|_| ()),
        Mode::Interactive => {
            let thickness = app.config().overlay_thickness;
            app.attach_overlay(RegionOverlay::new(
                host.clone(),
                edge_bars(&requests),
                thickness,
            ));
            let _ = requests.send(UiRequest::OverlayEnabled(app.config().show_region_overlay));
            app.console().line(Tag::Ready, "Select a region, then run OCR or ask.");

            for command in commands.iter() {
                log::debug!("Window command {command:?}");
                match command {
                    UiCommand::SelectRegion => {
                        if let Err(err) = app.action_select_region(&mut selection) {
                            log::warn!("{err:#}");
                        }
                    }
                    UiCommand::Ocr => {
                        app.action_ocr_only();
                    }
                    UiCommand::Ask => {
                        app.action_send_to_chat();
                    }
                    UiCommand::SetOverlay(enabled) => {
                        app.toggle_overlay(enabled);
                        let _ = requests
                            .send(UiRequest::OverlayEnabled(app.config().show_region_overlay));
                    }
                    UiCommand::ApplySettings => {
                        if let Err(err) = app.apply_chat_settings() {
                            app.console().error(&format!("{err:#}"));
                        }
                    }
                    UiCommand::ProbeChat => {
                        app.probe_chat();
                    }
                    UiCommand::Host(event) => host.borrow_mut().dispatch(event),
                    UiCommand::Quit => break,
                }
            }
            Ok(())
        }
    };

    let saved = app.shutdown();
    let _ = requests.send(UiRequest::Quit);
    result.and(saved)
}

// ---------- Window side ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionView {
    bounds: Region,
    preview: Option<Region>,
    held: bool,
    focused: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct EdgeView {
    bounds: Option<Region>,
    visible: bool,
}

impl EdgeView {
    fn shown(&self) -> Option<Region> {
        self.bounds.filter(|_| self.visible)
    }
}

/// What the window thread draws, as last requested by the worker
#[derive(Debug, Default)]
struct WindowState {
    console: VecDeque<String>,
    selection: Option<SelectionView>,
    edges: [EdgeView; 4],
    overlay_enabled: bool,
    quit: bool,
}

impl WindowState {
    fn apply(&mut self, request: UiRequest) {
        match request {
            UiRequest::OpenSelection(bounds) => {
                self.selection = Some(SelectionView {
                    bounds,
                    preview: None,
                    held: false,
                    focused: false,
                });
            }
            UiRequest::Preview(region) => {
                if let Some(view) = self.selection.as_mut() {
                    view.preview = Some(region);
                }
            }
            UiRequest::CloseSelection => self.selection = None,
            UiRequest::Edge(index, change) => {
                let Some(edge) = self.edges.get_mut(index) else {
                    log::debug!("No edge {index}");
                    return;
                };
                match change {
                    EdgeChange::Place(bounds) => edge.bounds = Some(bounds),
                    EdgeChange::Show => edge.visible = true,
                    EdgeChange::Hide => edge.visible = false,
                    EdgeChange::Destroy => *edge = EdgeView::default(),
                }
            }
            UiRequest::ConsoleLine(line) => {
                self.console.push_back(line);
                while self.console.len() > CONSOLE_LINES {
                    self.console.pop_front();
                }
            }
            UiRequest::OverlayEnabled(enabled) => self.overlay_enabled = enabled,
            UiRequest::Quit => self.quit = true,
        }
    }
}

/// Desktop pixels of `pos`, a point local to a viewport placed at `bounds`
fn to_desktop(pos: egui::Pos2, bounds: Region, pixels_per_point: f32) -> Point {
    Point::new(
        bounds.left + (pos.x * pixels_per_point).round() as i32,
        bounds.top + (pos.y * pixels_per_point).round() as i32,
    )
}

/// Selection input from one frame of the surface's events. `held` tracks
/// the primary button across frames; moves only count while it is down.
fn selection_input(
    events: &[egui::Event],
    bounds: Region,
    pixels_per_point: f32,
    held: &mut bool,
) -> Vec<InputEvent> {
    let mut input = Vec::new();
    for event in events {
        match event {
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed,
                ..
            } => {
                *held = *pressed;
                let point = to_desktop(*pos, bounds, pixels_per_point);
                input.push(if *pressed {
                    InputEvent::PointerDown(point)
                } else {
                    InputEvent::PointerUp(point)
                });
            }
            egui::Event::PointerMoved(pos) if *held => {
                input.push(InputEvent::PointerMove(to_desktop(
                    *pos,
                    bounds,
                    pixels_per_point,
                )));
            }
            egui::Event::Key {
                key: egui::Key::Escape,
                pressed: true,
                ..
            } => input.push(InputEvent::Escape),
            _ => {}
        }
    }
    input
}

/// `region` inside a viewport placed at `bounds`, in that viewport's points
fn local_rect(region: Region, bounds: Region, pixels_per_point: f32) -> egui::Rect {
    let local = region.translate(-bounds.left, -bounds.top);
    egui::Rect::from_min_size(
        egui::pos2(
            local.left as f32 / pixels_per_point,
            local.top as f32 / pixels_per_point,
        ),
        egui::vec2(
            local.width as f32 / pixels_per_point,
            local.height as f32 / pixels_per_point,
        ),
    )
}

/// Borderless, always-on-top viewport covering `region`
fn placed(title: &str, region: Region, pixels_per_point: f32) -> egui::ViewportBuilder {
    egui::ViewportBuilder::default()
        .with_title(title)
        .with_position([
            region.left as f32 / pixels_per_point,
            region.top as f32 / pixels_per_point,
        ])
        .with_inner_size([
            region.width as f32 / pixels_per_point,
            region.height as f32 / pixels_per_point,
        ])
        .with_decorations(false)
        .with_resizable(false)
        .with_always_on_top()
        .with_taskbar(false)
}

struct DesktopWindow {
    mode: Mode,
    requests: Receiver<UiRequest>,
    commands: Sender<UiCommand>,
    input: Sender<InputEvent>,
    state: WindowState,
    minimized: bool,
}

impl DesktopWindow {
    fn send(&self, command: UiCommand) {
        if self.commands.send(command).is_err() {
            log::debug!("Dropped {command:?}, worker has stopped");
        }
    }

    fn drain_requests(&mut self) {
        loop {
            match self.requests.try_recv() {
                Ok(request) => self.state.apply(request),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.state.quit = true;
                    break;
                }
            }
        }
    }

    /// Minimize/restore of the control window drives the outline
    fn track_minimized(&mut self, ctx: &egui::Context) {
        let minimized = ctx.input(|i| i.viewport().minimized).unwrap_or(false);
        if minimized != self.minimized {
            self.minimized = minimized;
            self.send(UiCommand::Host(if minimized {
                HostEvent::Minimized
            } else {
                HostEvent::Restored
            }));
        }
    }

    fn controls(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("actions").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| match self.mode {
                Mode::Interactive => {
                    if ui.button("Select Region").clicked() {
                        self.send(UiCommand::SelectRegion);
                    }
                    if ui.button("OCR Only").clicked() {
                        self.send(UiCommand::Ocr);
                    }
                    if ui.button("OCR + Ask").clicked() {
                        self.send(UiCommand::Ask);
                    }
                    let mut enabled = self.state.overlay_enabled;
                    if ui.checkbox(&mut enabled, "Show region overlay").changed() {
                        self.state.overlay_enabled = enabled;
                        self.send(UiCommand::SetOverlay(enabled));
                    }
                    if ui.button("Apply AI Settings").clicked() {
                        self.send(UiCommand::ApplySettings);
                    }
                    if ui.button("Test Chat").clicked() {
                        self.send(UiCommand::ProbeChat);
                    }
                }
                Mode::SelectOnce => {
                    ui.label("Drag over the screen to select a region. Esc cancels.");
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for line in &self.state.console {
                        ui.monospace(line);
                    }
                });
        });
    }

    fn edge_windows(&self, ctx: &egui::Context, pixels_per_point: f32) {
        for (index, edge) in self.state.edges.iter().enumerate() {
            let Some(bounds) = edge.shown() else {
                continue;
            };
            let builder =
                placed("ocrbox outline", bounds, pixels_per_point).with_mouse_passthrough(true);
            ctx.show_viewport_immediate(
                egui::ViewportId::from_hash_of(("edge", index)),
                builder,
                |ctx, _class| {
                    egui::CentralPanel::default()
                        .frame(egui::Frame::none().fill(EDGE_COLOR))
                        .show(ctx, |_ui| {});
                },
            );
        }
    }

    fn selection_window(&mut self, ctx: &egui::Context, pixels_per_point: f32) {
        let Some(mut view) = self.state.selection else {
            return;
        };
        let id = egui::ViewportId::from_hash_of("selection");
        if !view.focused {
            ctx.send_viewport_cmd_to(id, egui::ViewportCommand::Focus);
            view.focused = true;
        }

        let builder =
            placed("ocrbox selection", view.bounds, pixels_per_point).with_transparent(true);
        let input = ctx.show_viewport_immediate(id, builder, |ctx, _class| {
            let ppp = ctx.pixels_per_point();
            let input = ctx.input(|i| {
                let mut input = selection_input(&i.events, view.bounds, ppp, &mut view.held);
                if i.viewport().close_requested() {
                    input.push(InputEvent::Escape);
                }
                input
            });
            egui::CentralPanel::default()
                .frame(egui::Frame::none().fill(SHADE))
                .show(ctx, |ui| {
                    if let Some(preview) = view.preview {
                        ui.painter().rect_stroke(
                            local_rect(preview, view.bounds, ppp),
                            0.0,
                            egui::Stroke::new(2.0, EDGE_COLOR),
                        );
                    }
                });
            input
        });

        if let Some(current) = self.state.selection.as_mut() {
            current.held = view.held;
            current.focused = view.focused;
        }
        for event in input {
            if self.input.send(event).is_err() {
                log::debug!("Dropped {event:?}, worker has stopped");
            }
        }
    }
}

impl eframe::App for DesktopWindow {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_requests();
        if self.state.quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        if ctx.input(|i| i.viewport().close_requested()) {
            self.send(UiCommand::Quit);
        }

        self.track_minimized(ctx);
        let pixels_per_point = ctx
            .input(|i| i.viewport().native_pixels_per_point)
            .unwrap_or(1.0);
        self.controls(ctx);
        self.edge_windows(ctx, pixels_per_point);
        self.selection_window(ctx, pixels_per_point);
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

/// Open the windows on this thread and run the app built by `factory` on a
/// worker until either side quits. Call from the main thread.
pub fn run(mode: Mode, factory: AppFactory) -> anyhow::Result<()> {
    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let (input_tx, input_rx) = crossbeam_channel::unbounded();

    let worker = thread::Builder::new()
        .name("ocrbox-worker".to_string())
        .spawn(move || {
            let app = factory(window_console(request_tx.clone()));
            let channels = WorkerChannels {
                requests: request_tx,
                commands: command_rx,
                input: input_rx,
            };
            run_worker(app, mode, channels)
        })
        .context("starting worker thread")?;

    let window = DesktopWindow {
        mode,
        requests: request_rx,
        commands: command_tx,
        input: input_tx,
        state: WindowState::default(),
        minimized: false,
    };
    let size = match mode {
        Mode::Interactive => [640.0, 420.0],
        Mode::SelectOnce => [420.0, 140.0],
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size(size)
            .with_min_inner_size([320.0, 120.0]),
        ..Default::default()
    };
    // Dropping the window on return disconnects the worker's channels
    let shown = eframe::run_native(APP_TITLE, options, Box::new(move |_cc| Box::new(window)));

    let worked = worker
        .join()
        .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
    shown.map_err(|err| anyhow::anyhow!("desktop window failed: {err}"))?;
    worked
}
