// Chat command - interactive console conversation

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use agentchat_core::{
    AgentInvoker, ChatConfig, EchoAgent, FileFetcher, NoopFileFetcher, ScriptedAgent,
    SessionRegistry, UserInput,
};
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{listeners, SessionFactory};
use crate::output::OutputFormat;
use crate::render::ConsoleRenderer;
use crate::script::Script;

/// Registry key of the single console conversation
const CONSOLE_SESSION: &str = "console";

/// What a line typed at the prompt asks for
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Reset,
    Attach(&'a str),
    Message(&'a str),
    Empty,
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    match line {
        "" => ReplCommand::Empty,
        "/exit" | "exit" => ReplCommand::Exit,
        "/reset" => ReplCommand::Reset,
        _ => match line.strip_prefix("/attach ") {
            Some(path) if !path.trim().is_empty() => ReplCommand::Attach(path.trim()),
            _ => ReplCommand::Message(line),
        },
    }
}

fn prompt() {
    print!("👤 ");
    let _ = std::io::stdout().flush();
}

pub async fn run(
    config: &ChatConfig,
    output: OutputFormat,
    quiet: bool,
    script: Option<PathBuf>,
) -> Result<()> {
    let (agent, files): (Arc<dyn AgentInvoker>, Arc<dyn FileFetcher>) = match script {
        Some(path) => {
            let script = Script::load(&path)?;
            let agent = ScriptedAgent::new()
                .with_name(config.agent_name.as_str())
                .with_capacity(config.channel_capacity);
            script.into_agent(&agent).await;
            let files: Arc<dyn FileFetcher> = Arc::new(script.file_store().await);
            (Arc::new(agent), files)
        }
        None => (Arc::new(EchoAgent::new()), Arc::new(NoopFileFetcher)),
    };

    let renderer = Arc::new(ConsoleRenderer::new(output).hide_user_text());
    let factory = SessionFactory {
        agent,
        files,
        titles: config.tool_titles()?,
        listener: listeners(renderer.clone()),
    };

    let registry = SessionRegistry::new();
    let handle = registry
        .get_or_create(CONSOLE_SESSION, || factory.build())
        .await?;

    let interactive = output.is_text() && !quiet;
    if interactive {
        let session = handle.lock().await;
        println!(
            "Chatting with {} (thread {}). /attach <path> adds a file, /reset starts over, /exit quits.",
            session.agent_name(),
            session.thread_id()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attachments: Vec<String> = Vec::new();

    loop {
        if interactive {
            prompt();
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };

        // Time spent at the prompt counts as idle
        if !registry.evict_idle(config.session_idle).await.is_empty() {
            attachments.clear();
            renderer.clear().await;
            if interactive {
                println!("💤 Session was idle, starting a new conversation");
            }
        }

        let text = match parse_line(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Reset => {
                if registry.contains(CONSOLE_SESSION).await {
                    if let Err(e) = registry.reset(CONSOLE_SESSION).await {
                        eprintln!("❌ {}", e);
                        continue;
                    }
                }
                attachments.clear();
                renderer.clear().await;
                if interactive {
                    println!("🆕 New conversation");
                }
                continue;
            }
            ReplCommand::Attach(path) => {
                attachments.push(path.to_string());
                if interactive {
                    println!("📎 {} will be sent with your next message", path);
                }
                continue;
            }
            ReplCommand::Message(text) => text,
        };

        let input = attachments
            .drain(..)
            .fold(UserInput::new(text), |input, path| input.with_attachment(path));

        let handle = registry
            .get_or_create(CONSOLE_SESSION, || factory.build())
            .await?;
        let mut session = handle.lock().await;
        match session.send(input).await {
            Ok(summary) => {
                renderer.finish_line().await;
                tracing::debug!(
                    events = summary.events,
                    changes = summary.changes,
                    "Turn rendered"
                );
            }
            Err(e) => {
                renderer.finish_line().await;
                eprintln!("❌ {}", e);
            }
        }
    }

    if interactive {
        println!("👋 Bye");
    }
    Ok(())
}
