use std::sync::{Arc, Mutex};

/// Request-scoped diagnostic buffer, returned to the caller newline-joined.
///
/// Cloned into each executor worker; a mutex keeps interleaved pushes whole.
/// Tracing carries the same events for operators; this buffer is what the
/// translate response ships back.
#[derive(Clone, Default)]
pub struct RunLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "manuscript_translator::run", "{line}");
        self.lines.lock().expect("run log poisoned").push(line);
    }

    pub fn extend(&self, lines: impl IntoIterator<Item = String>) {
        let mut guard = self.lines.lock().expect("run log poisoned");
        guard.extend(lines);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("run log poisoned").clone()
    }

    pub fn render(&self) -> String {
        self.lines.lock().expect("run log poisoned").join("\n")
    }
}
