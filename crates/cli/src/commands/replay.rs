// Replay command - feed a recorded script through a session

use std::path::Path;
use std::sync::Arc;

use agentchat_core::{
    ChatConfig, FileFetcher, NoopTranscriptListener, ReconcileStats, ScriptedAgent, TranscriptListener,
    TranscriptSnapshot, TurnSummary,
};
use anyhow::Result;
use serde::Serialize;

use super::{listeners, SessionFactory};
use crate::output::{print_field, OutputFormat};
use crate::render::{transcript_text, ConsoleRenderer};
use crate::script::Script;

#[derive(Debug, Serialize)]
struct TurnReport {
    user: String,
    #[serde(flatten)]
    summary: TurnSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    agent: String,
    thread_id: String,
    turns: Vec<TurnReport>,
    skipped_events: usize,
    stats: ReconcileStats,
    transcript: TranscriptSnapshot,
}

pub async fn run(config: &ChatConfig, output: OutputFormat, quiet: bool, file: &Path) -> Result<()> {
    let script = Script::load(file)?;

    let agent = Arc::new(
        ScriptedAgent::new()
            .with_name(config.agent_name.as_str())
            .with_capacity(config.channel_capacity),
    );
    let skipped_events = script.into_agent(&agent).await;
    let files: Arc<dyn FileFetcher> = Arc::new(script.file_store().await);

    // Stream changes live only for interactive text output
    let live = output.is_text() && !quiet;
    let renderer: Arc<dyn TranscriptListener> = if live {
        Arc::new(ConsoleRenderer::new(output))
    } else {
        Arc::new(NoopTranscriptListener)
    };

    let factory = SessionFactory {
        agent,
        files,
        titles: config.tool_titles()?,
        listener: listeners(renderer),
    };
    let mut session = factory.build().await?;

    let mut turns = Vec::with_capacity(script.turns.len());
    for turn in &script.turns {
        let outcome = session.send(turn.input()).await;
        let report = match outcome {
            Ok(summary) => TurnReport {
                user: turn.user.clone(),
                summary,
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Scripted turn failed");
                TurnReport {
                    user: turn.user.clone(),
                    summary: session.last_turn(),
                    error: Some(e.to_string()),
                }
            }
        };
        if live {
            println!();
        }
        turns.push(report);
    }

    let report = ReplayReport {
        agent: session.agent_name().to_string(),
        thread_id: session.thread_id().to_string(),
        turns,
        skipped_events,
        stats: session.stats(),
        transcript: session.snapshot(),
    };

    if !output.is_text() {
        return output.print_value(&report);
    }

    if quiet {
        print!("{}", transcript_text(&report.transcript.messages));
        return Ok(());
    }

    let stats = report.stats;
    print_field("Turns", &report.turns.len().to_string());
    print_field("Messages", &report.transcript.len().to_string());
    print_field("Events", &stats.events.to_string());
    print_field(
        "Dropped",
        &format!(
            "{} malformed, {} unmatched, {} duplicate, {} sealed, {} undecodable",
            stats.malformed,
            stats.unmatched,
            stats.duplicate_completions,
            stats.sealed_rejections,
            report.skipped_events
        ),
    );
    for (i, turn) in report.turns.iter().enumerate() {
        if let Some(error) = &turn.error {
            print_field(&format!("Turn {} error", i + 1), error);
        }
    }
    Ok(())
}
