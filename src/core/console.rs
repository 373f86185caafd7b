//! Console-style log shown to the user
//!
//! Every line starts with a tag such as `[info]` or `[answer]`. Lines are
//! mirrored to the `log` facade; recognized text and answers only at debug
//! level since they come from the screen.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Ready,
    Info,
    Ocr,
    Answer,
    Warn,
    Error,
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Tag::Ready => "ready",
            Tag::Info => "info",
            Tag::Ocr => "ocr",
            Tag::Answer => "answer",
            Tag::Warn => "warn",
            Tag::Error => "error",
        }
    }
}

pub type ConsoleSink = Box<dyn FnMut(&str)>;

pub struct Console {
    sink: ConsoleSink,
}

impl Console {
    pub fn new(sink: ConsoleSink) -> Self {
        Self { sink }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(|line| println!("{line}")))
    }

    /// `[tag] text`
    pub fn line(&mut self, tag: Tag, text: &str) {
        match tag {
            Tag::Ready | Tag::Info => log::info!("{text}"),
            Tag::Warn => log::warn!("{text}"),
            Tag::Error => log::error!("{text}"),
            Tag::Ocr | Tag::Answer => log::debug!("[{}] {text}", tag.label()),
        }
        (self.sink)(&format!("[{}] {text}", tag.label()));
    }

    /// Tag on its own line followed by a multi-line body
    pub fn block(&mut self, tag: Tag, body: &str) {
        log::debug!("[{}] block of {} chars", tag.label(), body.len());
        (self.sink)(&format!("[{}]\n{}", tag.label(), body.trim()));
    }

    pub fn info(&mut self, text: &str) {
        self.line(Tag::Info, text);
    }

    pub fn warn(&mut self, text: &str) {
        self.line(Tag::Warn, text);
    }

    pub fn error(&mut self, text: &str) {
        self.line(Tag::Error, text);
    }
}

#[cfg(test)]
pub(crate) fn recording_console() -> (Console, std::rc::Rc<std::cell::RefCell<Vec<String>>>) {
    let lines = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink_lines = lines.clone();
    let console = Console::new(Box::new(move |line| {
        sink_lines.borrow_mut().push(line.to_string())
    }));
    (console, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_and_blocks_are_tagged() {
        let (mut console, lines) = recording_console();
        console.info("Region saved");
        console.block(Tag::Ocr, "  2 + 2\n");
        console.error("boom");
        assert_eq!(
            *lines.borrow(),
            vec!["[info] Region saved", "[ocr]\n2 + 2", "[error] boom"]
        );
    }
}
