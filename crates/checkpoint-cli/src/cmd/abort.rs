use crate::output::print_json;
use anyhow::Context;
use checkpoint_core::cycle;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let discarded = cycle::abort(root).context("failed to discard draft")?;
    if json {
        print_json(&serde_json::json!({ "discarded": discarded }))?;
    } else if discarded {
        println!("Discarded checkpoint draft.");
    } else {
        println!("No checkpoint in progress.");
    }
    Ok(())
}
