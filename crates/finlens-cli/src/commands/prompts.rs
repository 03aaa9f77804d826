//! Prompts-related command implementations

use anyhow::{bail, Result};
use finlens_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

/// List all available prompts and their override status
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!("Available Prompts:\n");

    println!("{:<20} {:>7}  {}", "ID", "VERSION", "OVERRIDE");
    println!("{}", "-".repeat(40));

    for id in PromptId::all() {
        let prompt = library.get(*id)?;
        let override_status = if prompt.is_override {
            "✓ Custom"
        } else {
            "Default"
        };
        println!(
            "{:<20} {:>7}  {}",
            id.as_str(),
            prompt.metadata.version,
            override_status
        );
    }

    println!();
    println!(
        "Override directory: {}",
        default_prompts_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );

    println!();
    println!("To customize a prompt:");
    println!("  1. Copy the default to the override directory");
    println!("  2. Edit the file with your changes");
    println!("  3. Restart the server to use the new prompt");

    Ok(())
}

/// Show the content of a specific prompt
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let Some(id) = PromptId::all().iter().find(|id| id.as_str() == prompt_id) else {
        let known: Vec<_> = PromptId::all().iter().map(|id| id.as_str()).collect();
        bail!("Unknown prompt '{}'. Available: {}", prompt_id, known.join(", "));
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(*id)?;

    println!(
        "# {} (v{}{})",
        id.as_str(),
        prompt.metadata.version,
        if prompt.is_override { ", custom" } else { "" }
    );
    println!();
    println!("{}", prompt.content);

    Ok(())
}

/// Show the prompts override directory path
pub fn cmd_prompts_path() -> Result<()> {
    match default_prompts_dir() {
        Some(path) => println!("{}", path.display()),
        None => bail!("No data directory available on this platform"),
    }
    Ok(())
}
