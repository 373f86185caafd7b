//! Application orchestration
//!
//! `App` owns the configuration and every collaborator, and turns user
//! actions (select a region, OCR it, ask the model) into console output.
//! Collaborator failures are reported on the console; actions never panic.

use std::path::PathBuf;

use anyhow::Context;
use image::RgbaImage;

use crate::calc::{evaluate_if_simple, pick_final_answer};
use crate::capture::ocr::{OcrProvider, TesseractEngine};
use crate::capture::{ScreenCapture, save_capture};
use crate::chat::{ChatError, ChatProvider, ChatRequest, OpenAiClient};
use crate::config::Config;
use crate::core::console::{Console, Tag};
use crate::domain::{Region, SelectionOutcome, virtual_desktop};
use crate::widget::region_overlay::RegionOverlay;
use crate::widget::region_selector::{SelectionBackend, SurfaceError, select_region};

pub struct App {
    config: Config,
    config_path: PathBuf,
    console: Console,
    capture: Box<dyn ScreenCapture>,
    /// Created on first OCR
    ocr: Option<Box<dyn OcrProvider>>,
    /// Created on first question or by `apply_chat_settings`
    chat: Option<Box<dyn ChatProvider>>,
    overlay: Option<RegionOverlay>,
    /// Region used instead of the stored one, never persisted
    region_override: Option<Region>,
    capture_dir: Option<PathBuf>,
}

impl App {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        console: Console,
        capture: Box<dyn ScreenCapture>,
    ) -> Self {
        Self {
            config,
            config_path,
            console,
            capture,
            ocr: None,
            chat: None,
            overlay: None,
            region_override: None,
            capture_dir: None,
        }
    }

    pub fn with_ocr(mut self, ocr: Box<dyn OcrProvider>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_chat(mut self, chat: Box<dyn ChatProvider>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Also write every grabbed region as a PNG into `dir`
    pub fn with_capture_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.capture_dir = dir;
        self
    }

    pub fn with_region_override(mut self, region: Option<Region>) -> Self {
        self.region_override = region;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Take ownership of the outline and show it if the config asks for it
    pub fn attach_overlay(&mut self, mut overlay: RegionOverlay) {
        if let Some(region) = self.config.region {
            overlay.update_region(region);
            if self.config.show_region_overlay {
                overlay.show(region);
            }
        }
        self.overlay = Some(overlay);
    }

    pub fn overlay(&self) -> Option<&RegionOverlay> {
        self.overlay.as_ref()
    }

    fn save_config(&mut self) {
        if let Err(err) = self.config.save(&self.config_path) {
            self.console.error(&format!("Could not save config: {err:#}"));
        }
    }

    // ---------- Region ----------

    /// Let the user drag out a new region over every display.
    ///
    /// The outline is hidden while the selection surface is up and comes
    /// back afterwards however the selection ends. Returns the new region,
    /// or `None` when the user cancelled.
    pub fn action_select_region<B: SelectionBackend>(
        &mut self,
        backend: &mut B,
    ) -> anyhow::Result<Option<Region>> {
        let monitors = self
            .capture
            .monitors()
            .context("listing displays for region selection")?;
        let bounds = virtual_desktop(&monitors).ok_or(SurfaceError::NoDisplay)?;
        self.console.info("Starting region selection overlay...");

        let outline_shown = self.overlay.as_ref().is_some_and(RegionOverlay::is_visible);
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.hide();
        }

        let outcome = select_region(backend, bounds, self.config.min_selection_size);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.restore_outline(outline_shown);
                self.console.error(&format!("Region selection failed: {err}"));
                return Err(err).context("opening selection surface");
            }
        };

        match outcome {
            SelectionOutcome::Selected(region) => {
                self.config.region = Some(region);
                self.console.info(&format!(
                    "Region saved: left={} top={} width={} height={}",
                    region.left, region.top, region.width, region.height
                ));
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.update_region(region);
                }
                self.restore_outline(outline_shown || self.config.show_region_overlay);
                self.save_config();
                Ok(Some(region))
            }
            SelectionOutcome::Cancelled(reason) => {
                log::debug!("Selection cancelled: {reason:?}");
                self.restore_outline(outline_shown);
                self.console.warn("Region selection cancelled.");
                Ok(None)
            }
        }
    }

    fn restore_outline(&mut self, show: bool) {
        if !show {
            return;
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.reshow();
        }
    }

    pub fn set_region(&mut self, region: Region) {
        self.config.region = Some(region);
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.update_region(region);
            if self.config.show_region_overlay && !overlay.is_visible() {
                overlay.show(region);
            }
        }
        self.console.info(&format!("Region saved: {region}"));
        self.save_config();
    }

    pub fn clear_region(&mut self) {
        self.config.region = None;
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.hide();
        }
        self.console.info("Region cleared.");
        self.save_config();
    }

    /// Show or hide the outline and remember the choice
    pub fn toggle_overlay(&mut self, enabled: bool) {
        self.config.show_region_overlay = enabled;
        match (enabled, self.config.region) {
            (true, Some(region)) => {
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.show(region);
                }
            }
            (true, None) => self.console.warn("No region set."),
            (false, _) => {
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.hide();
                }
            }
        }
        self.save_config();
    }

    // ---------- OCR ----------

    fn grab_region_image(&mut self) -> Option<RgbaImage> {
        let Some(region) = self.region_override.or(self.config.region) else {
            self.console.warn("No region set.");
            return None;
        };
        let img = match self.capture.capture(region) {
            Ok(img) => img,
            Err(err) => {
                self.console.error(&format!("Screen grab failed: {err}"));
                return None;
            }
        };
        if let Some(dir) = self.capture_dir.as_deref() {
            match save_capture(&img, dir) {
                Ok(path) => self
                    .console
                    .info(&format!("Capture saved to {}", path.display())),
                Err(err) => self.console.warn(&format!("Could not save capture: {err:#}")),
            }
        }
        Some(img)
    }

    fn recognize(&mut self, img: &RgbaImage) -> Option<String> {
        let engine: Box<dyn OcrProvider> = match self.ocr.take() {
            Some(engine) => engine,
            None => match TesseractEngine::new() {
                Ok(engine) => Box::new(engine),
                Err(err) => {
                    self.console.error(&err.to_string());
                    return None;
                }
            },
        };
        let engine = self.ocr.insert(engine);
        match engine.recognize(img, &self.config.ocr_options()) {
            Ok(text) => Some(text.trim().to_string()),
            Err(err) => {
                self.console.error(&err.to_string());
                None
            }
        }
    }

    /// Grab the region, recognize it and print the text as an `[ocr]` block
    pub fn action_ocr_only(&mut self) -> Option<String> {
        let img = self.grab_region_image()?;
        let text = self.recognize(&img)?;
        self.console.block(Tag::Ocr, &text);
        Some(text)
    }

    // ---------- Chat ----------

    fn chat_client(&mut self) -> Result<&dyn ChatProvider, ChatError> {
        let chat: Box<dyn ChatProvider> = match self.chat.take() {
            Some(chat) => chat,
            None => Box::new(OpenAiClient::new(self.config.chat_settings())?),
        };
        Ok(&**self.chat.insert(chat))
    }

    /// OCR the region and answer it, locally when it is plain arithmetic
    /// and that is enabled, otherwise through the chat model.
    pub fn action_send_to_chat(&mut self) -> Option<String> {
        self.console.info("Performing OCR and sending to ChatGPT...");
        let img = self.grab_region_image()?;
        let text = self.recognize(&img)?;
        if text.is_empty() {
            self.console.error("OCR produced no text.");
            return None;
        }

        if self.config.solve_simple_math_locally {
            let local = evaluate_if_simple(&text);
            if local.is_simple {
                self.console.info("Solved locally.");
                self.console.block(Tag::Answer, &local.value_text);
                return Some(local.value_text);
            }
        }

        let request = ChatRequest {
            system_prompt: self.config.system_prompt.clone(),
            user_text: text,
            max_response_tokens: self.config.max_tokens,
        };
        let reply = self.chat_client().and_then(|chat| chat.ask(&request));
        match reply {
            Ok(answer) => {
                let answer = if self.config.final_answer_only {
                    pick_final_answer(&answer)
                } else {
                    answer
                };
                self.console.block(Tag::Answer, &answer);
                Some(answer)
            }
            Err(ChatError::EmptyResponse) => {
                self.console.error("Model returned empty text.");
                None
            }
            Err(err) => {
                log::error!("Chat request failed: {err}");
                self.console.error(&err.to_string());
                None
            }
        }
    }

    /// Push model settings from the config to the client, creating it if needed
    pub fn apply_chat_settings(&mut self) -> anyhow::Result<()> {
        let settings = self.config.chat_settings();
        match self.chat.as_mut() {
            Some(chat) => chat.reconfigure(settings),
            None => {
                let client = OpenAiClient::new(settings).context("creating chat client")?;
                self.chat = Some(Box::new(client));
            }
        }
        self.console
            .info(&format!("AI settings applied (model {}).", self.config.model));
        Ok(())
    }

    /// Ask the model for a short poem to check the key and endpoint
    pub fn probe_chat(&mut self) -> Option<String> {
        let max_tokens = self.config.max_tokens;
        match self.chat_client().and_then(|chat| chat.probe(max_tokens)) {
            Ok(poem) => {
                self.console.block(Tag::Answer, &poem);
                Some(poem)
            }
            Err(err) => {
                self.console.error(&err.to_string());
                None
            }
        }
    }

    /// Persist the config and tear down the outline
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(overlay) = self.overlay.take() {
            overlay.destroy();
        }
        self.config
            .save(&self.config_path)
            .context("saving config at shutdown")
    }
}
