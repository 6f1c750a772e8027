//! Validate disease knowledge base files before shipping them
//!
//! Usage: cargo run --bin kb_check -- data/disease_knowledge_base.json [more.json...]
//!
//! With no arguments the bundled knowledge base is checked.

use anyhow::Result;
use cropguard::knowledge::KnowledgeBase;
use cropguard::types::HEALTHY;
use std::path::PathBuf;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        println!("Checking bundled knowledge base");
        let kb = KnowledgeBase::bundled()?;
        report(&kb);
        return Ok(());
    }

    let mut failures = 0;
    for arg in &args[1..] {
        let path = PathBuf::from(arg);
        println!("\nChecking: {:?}", path);

        match KnowledgeBase::load(&path) {
            Ok(kb) => report(&kb),
            Err(e) => {
                eprintln!("  INVALID: {}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("\n{} of {} file(s) failed", failures, args.len() - 1);
        std::process::exit(1);
    }

    println!("\nAll {} file(s) valid", args.len() - 1);
    Ok(())
}

fn report(kb: &KnowledgeBase) {
    println!("  {} crops, {} diseases", kb.crop_count(), kb.disease_count());

    for crop in kb.crops() {
        let diseases = crop.disease_names_excluding_healthy().len();
        let has_healthy = crop.treatment(HEALTHY).is_some();
        println!(
            "  {:<20} {:>2} disease(s){}",
            crop.name(),
            diseases,
            if has_healthy { "" } else { "  (no Healthy entry)" }
        );

        // Environment pathway picks by position; fewer than two diseases
        // means Medium severity falls back to Healthy.
        if diseases < 2 {
            println!("    note: Medium severity will resolve to {}", HEALTHY);
        }
    }
}
