//! `taskswarm run`: Execute a pipeline against the configured LLM.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use taskswarm::pipeline::{build_tasks, initial_variables};
use taskswarm_config::{AppConfig, PipelineConfig};
use taskswarm_engine::{
    CancellationToken, ChannelObserver, TaskExecutionContext, TaskManager, TaskStreamEvent,
};
use taskswarm_providers::OpenAiCompatClient;
use tracing::info;

pub async fn run(
    pipeline_path: &Path,
    overrides: Vec<(String, String)>,
    events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early so the error is clear
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TASKSWARM_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let pipeline = PipelineConfig::load_from(pipeline_path)?;
    let tasks = build_tasks(&pipeline)?;
    let client = Arc::new(OpenAiCompatClient::from_config(&config)?);

    info!(
        pipeline = %pipeline_path.display(),
        model = %config.model,
        tasks = tasks.len(),
        "Running pipeline"
    );

    let (observer, mut rx) = ChannelObserver::channel();
    let mut manager = TaskManager::new(client).with_observer(Arc::new(observer));
    for task in tasks {
        manager.add_task(task);
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if events {
                print_json(&event);
            } else {
                print_human(&event);
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut ctx = TaskExecutionContext::with_variables(initial_variables(&pipeline, &overrides));
    let result = manager.execute(&mut ctx, &cancel).await;
    ctrl_c.abort();

    // Dropping the manager closes the event channel
    drop(manager);
    printer.await?;

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => {
            eprintln!();
            eprintln!("  Cancelled.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json(event: &TaskStreamEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => eprintln!("  [Event Error] {e}"),
    }
}

fn print_human(event: &TaskStreamEvent) {
    match event {
        TaskStreamEvent::TaskStart { task_id } => {
            eprintln!();
            eprintln!("  ▶ {task_id}");
        }
        TaskStreamEvent::Token { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        TaskStreamEvent::ToolCall {
            name, arguments, ..
        } => {
            eprintln!();
            eprintln!("  ⚙ {name}({arguments})");
        }
        TaskStreamEvent::TaskComplete { .. } => println!(),
        TaskStreamEvent::TaskError { task_id, message } => {
            eprintln!();
            eprintln!("  [Error] {task_id}: {message}");
        }
        TaskStreamEvent::Complete { message } => {
            eprintln!();
            eprintln!("  ✅ {message}");
        }
        _ => {}
    }
}
