use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::Region;

const LONG_ABOUT: &str = r#"ocrbox reads text out of a fixed screen region and can ask a chat model about it.

WORKFLOW:
    1. Store the region to read (left,top,width,height in desktop pixels)
    2. Run OCR on it, or send the recognized text to the model
    3. Optionally keep an outline around the region on screen

EXAMPLES:
    ocrbox run
    ocrbox region select
    ocrbox region set 100,200,640,120
    ocrbox ocr
    ocrbox ask --save-capture ./shots
    ocrbox ocr --image screenshot.png --region 0,0,300,80
    ocrbox eval "2^10 + 1,000"
    echo "The result is 42" | ocrbox answer"#;

#[derive(Debug, Parser)]
#[command(name = "ocrbox")]
#[command(author, version)]
#[command(about = "Screen-region OCR with optional chat-model answers")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ./config.json, else the user config directory)
    #[arg(long, global = true, env = "OCRBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Append log records to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate TEXT when it is simple arithmetic
    Eval {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Print the final answer found in FILE (stdin when absent)
    Answer { file: Option<PathBuf> },

    /// Open the control window: select, OCR and ask with the outline shown
    Run,

    /// Capture the region and print the recognized text
    Ocr(CaptureArgs),

    /// Capture the region, recognize it and ask the chat model
    Ask(CaptureArgs),

    /// Show or change the stored region
    Region {
        #[command(subcommand)]
        action: RegionCommand,
    },

    /// Turn the region outline on or off; `run` shows it while open
    Overlay { state: Toggle },

    /// Check the chat model settings with a short request
    Probe,

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Use this region for one run without storing it
    #[arg(long, value_name = "L,T,W,H", allow_hyphen_values = true)]
    pub region: Option<Region>,

    /// Read pixels from a saved image instead of the screen
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    /// Also save each capture as a PNG in DIR
    #[arg(long, value_name = "DIR")]
    pub save_capture: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum RegionCommand {
    /// Drag out a new region over every display
    Select,
    Show,
    Set {
        #[arg(value_name = "L,T,W,H", allow_hyphen_values = true)]
        region: Region,
    },
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved config file path
    Path,
    /// Print the effective configuration as JSON
    Show,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn eval_joins_words() {
        let cli = Cli::try_parse_from(["ocrbox", "eval", "-3", "*", "4"]).unwrap();
        match cli.command {
            Command::Eval { text } => assert_eq!(text.join(" "), "-3 * 4"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn capture_flags_parse_regions() {
        let cli = Cli::try_parse_from([
            "ocrbox",
            "ocr",
            "--region",
            "-1920,0,300,80",
            "--image",
            "shot.png",
        ])
        .unwrap();
        match cli.command {
            Command::Ocr(args) => {
                assert_eq!(args.region, Some(Region::new(-1920, 0, 300, 80)));
                assert_eq!(args.image, Some(PathBuf::from("shot.png")));
                assert_eq!(args.save_capture, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_region_is_rejected() {
        assert!(Cli::try_parse_from(["ocrbox", "region", "set", "10,10,0,5"]).is_err());
        assert!(Cli::try_parse_from(["ocrbox", "ask", "--region", "1,2,3"]).is_err());
    }

    #[test]
    fn interactive_commands_parse() {
        let cli = Cli::try_parse_from(["ocrbox", "region", "select"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Region {
                action: RegionCommand::Select
            }
        ));
        let cli = Cli::try_parse_from(["ocrbox", "run"]).unwrap();
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli =
            Cli::try_parse_from(["ocrbox", "overlay", "on", "--config", "/tmp/c.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        assert!(matches!(cli.command, Command::Overlay { state: Toggle::On }));
    }
}
