mod calc;
mod capture;
mod chat;
mod commands;
mod config;
mod core;
mod domain;
mod logging;
mod widget;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use crate::capture::ScreenCapture;
use crate::capture::file::ImageFileCapture;
use crate::commands::{CaptureArgs, Cli, Command, ConfigCommand, RegionCommand, Toggle};
use crate::config::Config;
use crate::core::app::App;
use crate::core::console::{Console, Tag};
use crate::widget::desktop::{self, Mode};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref());
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Command::Eval { text } => {
            let result = calc::evaluate_if_simple(&text.join(" "));
            if result.is_simple {
                println!("{}", result.value_text);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("not simple arithmetic");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Answer { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("reading stdin")?;
                    text
                }
            };
            println!("{}", calc::pick_final_answer(&text));
            Ok(ExitCode::SUCCESS)
        }
        Command::Config {
            action: ConfigCommand::Path,
        } => {
            println!("{}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Config {
            action: ConfigCommand::Show,
        } => {
            let config = Config::load(&config_path);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run => run_desktop(Mode::Interactive, config_path),
        Command::Region {
            action: RegionCommand::Select,
        } => run_desktop(Mode::SelectOnce, config_path),
        command => run_app(command, config_path),
    }
}

fn build_app(config_path: PathBuf, args: Option<CaptureArgs>, console: Console) -> App {
    let config = Config::load(&config_path);
    let Some(args) = args else {
        return App::new(config, config_path, console, capture::default_capture());
    };
    let capture: Box<dyn ScreenCapture> = match args.image {
        Some(path) => Box::new(ImageFileCapture::new(path)),
        None => capture::default_capture(),
    };
    App::new(config, config_path, console, capture)
        .with_region_override(args.region)
        .with_capture_dir(args.save_capture)
}

/// Commands that need windows; the app runs beside the window thread
fn run_desktop(mode: Mode, config_path: PathBuf) -> anyhow::Result<ExitCode> {
    desktop::run(
        mode,
        Box::new(move |console: Console| build_app(config_path, None, console)),
    )?;
    Ok(ExitCode::SUCCESS)
}

/// Commands that act through the application and save the config on exit
fn run_app(command: Command, config_path: PathBuf) -> anyhow::Result<ExitCode> {
    let (capture_args, command) = match command {
        Command::Ocr(args) => (Some(args), Action::Ocr),
        Command::Ask(args) => (Some(args), Action::Ask),
        Command::Region { action } => (None, Action::Region(action)),
        Command::Overlay { state } => (None, Action::Overlay(state)),
        Command::Probe => (None, Action::Probe),
        Command::Eval { .. } | Command::Answer { .. } | Command::Config { .. } | Command::Run => {
            anyhow::bail!("command is not handled here")
        }
    };

    let mut app = build_app(config_path, capture_args, Console::stdout());
    let ok = match command {
        Action::Ocr => {
            app.console().line(Tag::Ready, "OCR");
            app.action_ocr_only().is_some()
        }
        Action::Ask => {
            app.console().line(Tag::Ready, "OCR and chat");
            app.action_send_to_chat().is_some()
        }
        Action::Region(RegionCommand::Select) => {
            anyhow::bail!("region selection needs the desktop window")
        }
        Action::Region(RegionCommand::Show) => {
            let region = app.config().region;
            match region {
                Some(region) => app.console().info(&format!(
                    "Region: left={} top={} width={} height={}",
                    region.left, region.top, region.width, region.height
                )),
                None => app.console().warn("No region set."),
            }
            true
        }
        Action::Region(RegionCommand::Set { region }) => {
            app.set_region(region);
            true
        }
        Action::Region(RegionCommand::Clear) => {
            app.clear_region();
            true
        }
        Action::Overlay(state) => {
            app.toggle_overlay(state == Toggle::On);
            true
        }
        Action::Probe => app.probe_chat().is_some(),
    };

    app.shutdown()?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

enum Action {
    Ocr,
    Ask,
    Region(RegionCommand),
    Overlay(Toggle),
    Probe,
}
