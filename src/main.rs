//! Hive - 多 Worker 编排引擎命令行入口
//!
//! `hive <goal…>` 运行一个目标，步骤挂起时从 stdin 读取回答；
//! `hive --recover <run_id>` 从检查点继续；`hive --runs` 列出已保存的运行。

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hive::core::{create_orchestrator_builder, Orchestrator, RunEvent, RunHandle, RunOutcome};

#[derive(Debug, Parser)]
#[command(name = "hive", about = "Plan / execute / replan orchestration over a team of workers")]
struct Cli {
    /// 额外的配置文件（叠加在 config/default.toml 之上）
    #[arg(long)]
    config: Option<PathBuf>,
    /// 从检查点继续某个运行
    #[arg(long, value_name = "RUN_ID", conflicts_with = "runs")]
    recover: Option<String>,
    /// 列出已保存的运行
    #[arg(long)]
    runs: bool,
    #[arg(value_name = "GOAL")]
    goal: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();
    let cli = Cli::parse();

    let orchestrator = create_orchestrator_builder(cli.config.clone())
        .build()
        .context("Failed to build orchestrator")?;

    if cli.runs {
        for run_id in orchestrator.list_runs().await.context("Failed to list runs")? {
            let state = orchestrator.state(&run_id).await?;
            let status = match (state.termination(), state.pending_suspension()) {
                (Some(reason), _) => format!("{:?}", reason),
                (None, Some(_)) => "suspended".to_string(),
                (None, None) => "in progress".to_string(),
            };
            let updated = chrono::DateTime::from_timestamp_millis(state.updated_at())
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            println!("{}\t{}\t{}\t{}", run_id, status, updated, state.goal());
        }
        return Ok(());
    }

    let handle = match cli.recover {
        Some(run_id) => orchestrator
            .recover(&run_id)
            .await
            .with_context(|| format!("Failed to recover run {}", run_id))?,
        None => {
            let goal = cli.goal.join(" ");
            anyhow::ensure!(!goal.trim().is_empty(), "usage: hive <goal…> | --recover <run_id> | --runs");
            orchestrator.start_run(goal)
        }
    };

    drive_to_completion(&orchestrator, handle).await
}

/// 打印事件；挂起时从 stdin 读取回答并继续，直到运行结束
async fn drive_to_completion(orchestrator: &Arc<Orchestrator>, mut handle: RunHandle) -> anyhow::Result<()> {
    loop {
        println!("run {}", handle.run_id());
        while let Some(event) = handle.next_event().await {
            print_event(&event);
        }
        match handle.wait().await.context("Run failed")? {
            RunOutcome::Completed { report, .. } => {
                println!("\n{}", report);
                return Ok(());
            }
            RunOutcome::Suspended { token, question } => {
                print!("\n{}\n> ", question);
                std::io::stdout().flush().ok();
                let answer = read_answer().await?;
                handle = orchestrator
                    .resume(&token, answer)
                    .await
                    .context("Failed to resume run")?;
            }
        }
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::Planned { steps } => println!("plan: {} step(s)", steps.len()),
        RunEvent::Dispatching { step } => println!("→ {}: {}", step.worker, step.task),
        RunEvent::StepCompleted { step } => println!(
            "  {} {}: {}",
            if step.status { "✓" } else { "✗" },
            step.worker,
            step.summary
        ),
        RunEvent::Replanned { plan } => println!("replanned: {} step(s) left", plan.len()),
        RunEvent::Suspended { token, .. } => println!("suspended (token {})", token),
        RunEvent::Completed { reason, .. } => println!("completed ({:?})", reason),
        RunEvent::Failed { error } => eprintln!("failed: {}", error),
    }
}

async fn read_answer() -> anyhow::Result<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line.trim().to_string())
    })
    .await
    .context("stdin reader failed")?
    .context("Failed to read answer")
}
