//! `bolty models`: what the backend serves right now, and the order models would be tried in.

use bolty_core::provider::Capability;
use bolty_providers::{ProviderCatalog, ResilientInvoker, build_from_config};
use std::path::Path;

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(explicit)?;
    let backend = build_from_config(&config)?;

    println!("🤖 Models ({})", backend.name());
    println!("==========");

    let models = ProviderCatalog::new(backend.clone()).list_available_models().await;
    if models.is_empty() {
        println!("   No models discovered (discovery failed or the backend lists none).");
    } else {
        println!("   {:<48} {:<10} {:<10}", "Model", "Streaming", "Blocking");
        for model in &models {
            let mark = |cap| if model.supports(cap) { "yes" } else { "-" };
            println!(
                "   {:<48} {:<10} {:<10}",
                model.identifier,
                mark(Capability::Streaming),
                mark(Capability::NonStreaming)
            );
        }
    }

    let invoker = ResilientInvoker::new(backend);
    for mode in [Capability::Streaming, Capability::NonStreaming] {
        let order = invoker.candidates(&config.preferred_models, mode).await;
        println!();
        println!("   Candidate order ({mode}):");
        for (i, id) in order.iter().enumerate() {
            println!("   {:>3}. {id}", i + 1);
        }
    }

    Ok(())
}
