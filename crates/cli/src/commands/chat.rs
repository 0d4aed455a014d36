//! `salin chat` — Interactive or single-message tool-calling chat.

use std::io::Write;
use std::sync::Arc;

use salin_agent::{AgentLoop, AgentStreamEvent, ReflectionPipeline, register_judge};
use salin_core::message::Conversation;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub async fn run(message: Option<String>, stream: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let router = salin_providers::build_from_config(&config);
    let provider = router.require_default()?;

    // The judge shares the chat provider but keeps its own sampling settings.
    let pipeline = Arc::new(ReflectionPipeline::from_config(provider.clone(), &config));
    let mut registry = salin_tools::default_registry();
    register_judge(&mut registry, pipeline);
    let tool_names: Vec<String> = registry.names().iter().map(|n| n.to_string()).collect();
    let tools = Arc::new(registry);

    let streaming = stream || config.agent.stream;
    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(rx, streaming));
    let agent = AgentLoop::from_config(provider, tools, &config)
        .with_streaming(streaming)
        .with_event_sender(tx);

    let mut conv = Conversation::new();

    if let Some(msg) = message {
        let result = agent.run_turn(&mut conv, msg).await;
        drop(agent);
        printer.await?;
        let response = result?;
        if !streaming {
            println!("{response}");
        }
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Salin — Interactive Chat            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Judge:     {}", config.judge_model());
    println!("  Tools:     {}", tool_names.join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt()?;
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        if !streaming {
            eprint!("  ...");
        }
        match agent.run_turn(&mut conv, input).await {
            Ok(response) => {
                if !streaming {
                    eprint!("\r     \r");
                    println!();
                    for line in response.lines() {
                        println!("  Assistant > {line}");
                    }
                }
                println!();
            }
            // The error event has already been reported by the printer.
            Err(_) => println!(),
        }

        prompt()?;
    }

    drop(agent);
    printer.await?;

    println!();
    println!("  Paalam! 👋");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

/// Render agent events until the sender side is dropped.
async fn print_events(mut rx: mpsc::Receiver<AgentStreamEvent>, streaming: bool) {
    let mut mid_reply = false;
    while let Some(event) = rx.recv().await {
        match event {
            AgentStreamEvent::Chunk { content } if streaming => {
                if !mid_reply {
                    print!("\n  Assistant > ");
                    mid_reply = true;
                }
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            AgentStreamEvent::Chunk { .. } => {}
            AgentStreamEvent::ToolCall { name, input, .. } => {
                if mid_reply {
                    println!();
                    mid_reply = false;
                }
                eprintln!("  [tool] {name} {input}");
            }
            AgentStreamEvent::ToolResult { name, output, .. } => {
                tracing::debug!(tool = %name, output = %output, "Tool result");
            }
            AgentStreamEvent::Done {
                iterations,
                tool_calls_made,
                usage,
                ..
            } => {
                if mid_reply {
                    println!();
                    mid_reply = false;
                }
                tracing::debug!(
                    iterations,
                    tool_calls_made,
                    total_tokens = usage.map(|u| u.total_tokens).unwrap_or(0),
                    "Turn complete"
                );
            }
            AgentStreamEvent::Error { message } => {
                if mid_reply {
                    println!();
                    mid_reply = false;
                }
                eprintln!("  [Error] {message}");
            }
        }
    }
}
