use chrono::{DateTime, Local};
use std::collections::VecDeque;

pub const MAX_LINES: usize = 500;
pub const CLEARED_MESSAGE: &str = "Console limpo. Aguardando comandos...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConsoleLine {
    pub at: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl ConsoleLine {
    pub fn stamped(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Append-only activity log shown in the console modal.
#[derive(Clone, Debug, Default)]
pub struct ConsoleLog {
    lines: VecDeque<ConsoleLine>,
}

impl ConsoleLog {
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        if self.lines.len() == MAX_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(ConsoleLine { at: Local::now(), level, message: message.into() });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message)
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Level::Success, message)
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.info(CLEARED_MESSAGE);
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn count(&self, level: Level) -> usize {
        self.lines.iter().filter(|l| l.level == level).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrollback_is_bounded() {
        let mut log = ConsoleLog::default();
        for i in 0..MAX_LINES + 5 {
            log.info(format!("line {}", i));
        }
        assert_eq!(log.len(), MAX_LINES);
        assert_eq!(log.lines().next().map(|l| l.message.as_str()), Some("line 5"));
    }

    #[test]
    fn clear_leaves_placeholder() {
        let mut log = ConsoleLog::default();
        log.error("boom");
        log.clear();
        assert_eq!(log.len(), 1);
        assert_eq!(log.count(Level::Info), 1);
        assert_eq!(log.lines().next().map(|l| l.message.as_str()), Some(CLEARED_MESSAGE));
    }

    #[test]
    fn stamped_line_has_clock_prefix() {
        let mut log = ConsoleLog::default();
        log.success("ok");
        let line = log.lines().next().unwrap().stamped();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] ok"));
    }
}
