//! `bolty history`: show a project's stored turns.

use bolty_core::turn::{ProjectId, TurnRole};
use std::path::Path;

const PREVIEW_CHARS: usize = 120;

pub async fn run(
    explicit: Option<&Path>,
    project: &str,
    json: bool,
    full: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(explicit)?;
    let store = super::open_store(&config)?;
    let turns = store.history(&ProjectId::new(project)).await?;

    if json {
        for turn in &turns {
            println!("{}", serde_json::to_string(turn)?);
        }
        return Ok(());
    }

    if turns.is_empty() {
        println!("No conversation stored for project '{project}'.");
        return Ok(());
    }

    println!("💬 Project '{project}' ({} turns, {} store)", turns.len(), store.name());
    for turn in &turns {
        let role = match turn.role {
            TurnRole::User => "user ",
            TurnRole::Model => "model",
        };
        let text = if full { turn.text.clone() } else { preview(&turn.text) };
        println!(
            "   #{:<4} {} {}  {}",
            turn.sequence,
            turn.created_at.format("%Y-%m-%d %H:%M:%S"),
            role,
            text
        );
    }

    Ok(())
}

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}
