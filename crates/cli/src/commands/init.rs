//! `bolty init`: first-time setup.

use bolty_config::AppConfig;
use std::path::Path;

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_file(explicit);

    println!("⚡ Bolty: First-Time Setup");
    println!("==========================\n");

    if let Some(config_dir) = config_path.parent()
        && !config_dir.as_os_str().is_empty()
        && !config_dir.exists()
    {
        std::fs::create_dir_all(config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = super::load_config(explicit)?;
    let workspace_dir = Path::new(&config.workspace.base_dir);
    if !workspace_dir.exists() {
        std::fs::create_dir_all(workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    } else {
        println!("   Workspace directory exists: {}", workspace_dir.display());
    }

    println!("\n📝 Next steps:");
    if config.has_api_key() {
        println!("   API key found.");
    } else {
        println!("   Set your API key: export GEMINI_API_KEY=...");
    }
    println!("   Try it: bolty generate \"a todo list app\" --project todo");

    Ok(())
}
