//! Interactive chat mode.
//!
//! A line-based REPL over one agent: questions run the tool-calling loop,
//! slash commands inspect or reset local state.

use std::io::{BufRead, Write};

use anyhow::Result;

use tabqa_core::usage::UsageSnapshot;
use tabqa_core::Agent;

/// One-line usage summary printed after each answer.
pub fn usage_line(usage: &UsageSnapshot) -> String {
    format!(
        "[tokens: {} in / {} out / {} total · est. cost ${:.4}]",
        usage.input_tokens, usage.output_tokens, usage.total_tokens, usage.estimated_cost_usd
    )
}

pub async fn run_chat(mut agent: Agent) -> Result<()> {
    println!(
        "tabqa chat — provider: {}, model: {}",
        agent.provider_name(),
        agent.model()
    );
    println!("bound files: {}", agent.available_files().join(", "));
    println!("commands: /usage /files /reset /quit");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/usage" => {
                println!("{}", usage_line(&agent.usage()));
            }
            "/files" => {
                for id in agent.available_files() {
                    println!("{id}");
                }
            }
            "/reset" => {
                agent.reset();
                println!("conversation reset");
            }
            question => match agent.ask(question).await {
                Ok(answer) => {
                    println!("{}", answer.text);
                    println!("{}", usage_line(&answer.usage));
                }
                Err(e) => {
                    // Provider/timeout failures end the question, not the
                    // REPL; the next line starts fresh against the same
                    // transcript.
                    eprintln!("error ({}): {e}", e.kind());
                }
            },
        }
    }

    Ok(())
}
