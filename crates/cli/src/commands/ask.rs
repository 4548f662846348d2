//! `coursemate ask`: Single-question or interactive chat mode.
//!
//! Interactive mode keeps a [`ConversationState`] for the session, so later
//! questions see earlier turns and the rolling summary. `/level <name>`
//! switches proficiency mid-conversation.

use std::io::Write;
use std::path::Path;

use coursemate_assistant::{AnswerPipeline, ConversationState};
use coursemate_core::answer::StructuredAnswer;
use coursemate_core::proficiency::ProficiencyLevel;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_file: Option<&Path>,
    message: Option<String>,
    level: ProficiencyLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_file)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  NOTE: No API key for '{}'.", config.assistant.provider);
        eprintln!("  Answers will be canned. Set ANTHROPIC_API_KEY or OPENAI_API_KEY,");
        eprintln!("  or add it to {}", super::config_path(config_file).display());
        eprintln!();
    }

    let pipeline = AnswerPipeline::connect(&config).await;
    let mut state = ConversationState::new(level);

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let answer = pipeline.answer_turn(&mut state, &msg).await?;
        eprint!("\r              \r");
        print_answer(&answer);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║       Coursemate — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Course:    {}", pipeline.course_name());
    println!("  Provider:  {}", pipeline.provider_name());
    println!("  Store:     {} ({})", pipeline.retrieval().store_name(), pipeline.store_mode().label());
    println!("  Level:     {}", state.proficiency());
    println!();
    println!("  Type your question and press Enter.");
    println!("  '/level beginner|intermediate|expert' changes level.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            _ if input.starts_with("/level") => {
                let requested = input.trim_start_matches("/level").trim();
                match requested.parse::<ProficiencyLevel>() {
                    Ok(level) => {
                        state.set_proficiency(level);
                        println!("  Level set to {level}.\n");
                    }
                    Err(e) => eprintln!("  [Error] {e}\n"),
                }
            }
            question => {
                eprint!("  ...");
                match pipeline.answer_turn(&mut state, question).await {
                    Ok(answer) => {
                        eprint!("\r     \r");
                        println!();
                        print_answer(&answer);
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}\n");
                    }
                }
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_answer(answer: &StructuredAnswer) {
    for line in answer.answer_text.lines() {
        println!("  Assistant > {line}");
    }

    if !answer.sources.is_empty() {
        println!();
        println!("  Sources:");
        for source in &answer.sources {
            match &source.section_title {
                Some(section) => println!("    [{}] {} — {} ({})", source.id, source.title, section, source.url),
                None => println!("    [{}] {} ({})", source.id, source.title, source.url),
            }
        }
    }

    if !answer.follow_up_questions.is_empty() {
        println!();
        println!("  You might ask:");
        for question in &answer.follow_up_questions {
            println!("    • {question}");
        }
    }
    println!();
}
