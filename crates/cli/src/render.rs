// Console transcript renderer
//
// A terminal cannot redraw earlier lines, so the renderer appends: streamed
// text prints only its new suffix, and a finished tool call gets a line of
// its own. In json/yaml mode every change is printed as one document instead.

use std::collections::HashMap;
use std::io::Write;

use agentchat_core::{
    MessageContent, MessageRole, MessageStatus, TranscriptChange, TranscriptListener,
    TranscriptMessage,
};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::output::OutputFormat;

#[derive(Default)]
struct RenderState {
    /// message index -> text already printed for it
    printed: HashMap<usize, String>,
    /// Index of the message whose text ends the current output line
    open_line: Option<usize>,
}

pub struct ConsoleRenderer {
    format: OutputFormat,
    show_user: bool,
    state: Mutex<RenderState>,
}

impl ConsoleRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            show_user: true,
            state: Mutex::new(RenderState::default()),
        }
    }

    /// Skip user text messages (the REPL user just typed them)
    pub fn hide_user_text(mut self) -> Self {
        self.show_user = false;
        self
    }

    /// Forget printed state after the transcript is replaced
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.printed.clear();
        state.open_line = None;
    }

    /// Terminate a line left open by streamed text
    pub async fn finish_line(&self) {
        let mut state = self.state.lock().await;
        if state.open_line.take().is_some() {
            println!();
        }
    }

    fn render_text(&self, state: &mut RenderState, change: &TranscriptChange) -> String {
        let index = change.index();
        let message = change.message();
        let mut out = String::new();

        if let Some(tool) = &message.tool {
            close_line(state, &mut out);
            match (change.is_appended(), message.status) {
                (true, _) => {
                    out.push_str(&format!("{} ⏳", tool.title));
                    if let Some(body) = message.text().filter(|b| !b.is_empty()) {
                        out.push_str(&format!(" {}", body));
                    }
                    out.push('\n');
                }
                (false, MessageStatus::Done) => {
                    out.push_str(&format!("{} ✅", tool.title));
                    if let Some(result) = &tool.result {
                        out.push_str(&format!(" {}", summarize(result)));
                    }
                    out.push('\n');
                }
                _ => {}
            }
            return out;
        }

        match &message.content {
            MessageContent::File(file) => {
                if message.role == MessageRole::User && !self.show_user {
                    return out;
                }
                close_line(state, &mut out);
                let name = file.name.as_deref().unwrap_or("file");
                let icon = if file.is_image() { "🖼" } else { "📎" };
                out.push_str(&format!("{} {} ({} bytes)\n", icon, name, file.size()));
            }
            MessageContent::Text(text) if message.role == MessageRole::User => {
                if self.show_user {
                    close_line(state, &mut out);
                    out.push_str(&format!("👤 {}\n", text));
                }
            }
            MessageContent::Text(text) => {
                let printed = state.printed.get(&index).cloned();
                match printed {
                    Some(prev) if state.open_line == Some(index) && text.starts_with(&prev) => {
                        out.push_str(&text[prev.len()..]);
                    }
                    Some(_) => {
                        // Earlier text was rewritten (citation links); reprint it whole
                        close_line(state, &mut out);
                        out.push_str(&format!("🤖 {}", text));
                    }
                    None => {
                        close_line(state, &mut out);
                        out.push_str(&format!("🤖 {}", text));
                    }
                }
                state.printed.insert(index, text.clone());
                state.open_line = Some(index);
            }
        }
        out
    }
}

fn close_line(state: &mut RenderState, out: &mut String) {
    if state.open_line.take().is_some() {
        out.push('\n');
    }
}

fn write_stdout(out: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(out.as_bytes());
    let _ = stdout.flush();
}

fn summarize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TranscriptListener for ConsoleRenderer {
    async fn on_change(&self, change: &TranscriptChange) {
        if !self.format.is_text() {
            if let Err(e) = self.format.print_value(change) {
                tracing::warn!(error = %e, "Failed to print change");
            }
            return;
        }

        let out = {
            let mut state = self.state.lock().await;
            self.render_text(&mut state, change)
        };
        if out.is_empty() {
            return;
        }

        write_stdout(&out);
    }

    fn name(&self) -> &'static str {
        "ConsoleRenderer"
    }
}

/// Text rendering of a finished transcript (used for the replay summary)
pub fn transcript_text(messages: &[TranscriptMessage]) -> String {
    let renderer = ConsoleRenderer::new(OutputFormat::Text);
    let mut state = RenderState::default();
    let mut out = String::new();
    for (index, message) in messages.iter().enumerate() {
        let change = TranscriptChange::Appended {
            index,
            message: message.clone(),
        };
        out.push_str(&renderer.render_text(&mut state, &change));
        if message.is_tool_call() && message.status == MessageStatus::Done {
            let done = TranscriptChange::Mutated {
                index,
                message: message.clone(),
            };
            out.push_str(&renderer.render_text(&mut state, &done));
        }
    }
    close_line(&mut state, &mut out);
    out
}
