//! Processors command implementation

use anyhow::{Context, Result};
use dbupdates::{DbUpdatesConfig, ProcessorRegistry};
use std::sync::Arc;

pub fn execute(config: Arc<DbUpdatesConfig>) -> Result<()> {
    let registry = ProcessorRegistry::builtin().context("Failed to build processor registry")?;

    println!("\nRegistered Processors");
    println!("{}", "=".repeat(60));
    for name in registry.names() {
        let entry = registry.lookup(name)?;
        let args = entry
            .init_args()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<30} {}", name, args);
    }

    println!("\nConfigured Namespaces (instance {})", config.instance);
    println!("{}", "=".repeat(60));
    if config.namespaces.is_empty() {
        println!("  (none)");
    }
    for ns in &config.namespaces {
        let status = if registry.contains(&ns.name) {
            "ok"
        } else {
            "NOT REGISTERED"
        };
        println!(
            "  {:<30} topic={} partitions={} [{}]",
            ns.name,
            config.topic_for(&ns.name),
            ns.partitions,
            status
        );
    }

    Ok(())
}
