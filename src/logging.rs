//! Logger setup

use std::fs::{File, OpenOptions};
use std::path::Path;

/// Open `path` for appending, creating it and its parent directory
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global logger. `RUST_LOG` overrides the default `info`
/// filter. With `log_file`, records go there instead of stderr.
pub fn init(log_file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let mut open_error = None;
    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                builder
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .write_style(env_logger::WriteStyle::Never);
            }
            Err(err) => open_error = Some((path, err)),
        }
    }
    builder.init();

    if let Some((path, err)) = open_error {
        log::warn!(
            "Could not open log file {}, logging to stderr: {err}",
            path.display()
        );
    }
}
