//! `taskswarm check`: Validate a pipeline without calling the LLM.

use std::path::Path;
use taskswarm::pipeline::{build_tasks, unresolved_placeholders};
use taskswarm_config::PipelineConfig;

pub async fn run(pipeline_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Checking {}...", pipeline_path.display());

    let pipeline = PipelineConfig::load_from(pipeline_path)?;
    let tasks = build_tasks(&pipeline)?;
    println!("   ✅ {} task(s), {} variable(s)", tasks.len(), pipeline.variables.len());
    println!();

    // Placeholders may still be filled by tools of earlier tasks
    for (i, task) in tasks.iter().enumerate() {
        let tools: Vec<String> = task.tool_definitions().into_iter().map(|d| d.name).collect();
        println!(
            "   {}. {:<16} tools: {}",
            i + 1,
            task.id,
            if tools.is_empty() { "-".to_string() } else { tools.join(", ") }
        );

        for key in unresolved_placeholders(&task.instructions, &pipeline.variables) {
            println!("      ⚠️  {{{{{key}}}}} is not set up front");
        }
    }

    Ok(())
}
