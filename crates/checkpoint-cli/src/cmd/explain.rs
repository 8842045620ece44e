use crate::output::print_json;
use anyhow::Context;
use checkpoint_core::history::{
    load_history_from_root, rank_next_steps, render_decisions, render_failed,
    render_next_steps, render_patterns, render_recent_checkpoints, HistoryData,
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    History,
    NextSteps,
    Patterns,
    Decisions,
    Failed,
}

impl Section {
    const ALL: [Section; 5] = [
        Section::History,
        Section::NextSteps,
        Section::Patterns,
        Section::Decisions,
        Section::Failed,
    ];

    fn name(self) -> &'static str {
        match self {
            Section::History => "history",
            Section::NextSteps => "next-steps",
            Section::Patterns => "patterns",
            Section::Decisions => "decisions",
            Section::Failed => "failed",
        }
    }

    fn parse(s: &str) -> anyhow::Result<Self> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        Section::ALL
            .into_iter()
            .find(|sec| sec.name() == norm)
            .ok_or_else(|| {
                let names: Vec<&str> = Section::ALL.iter().map(|s| s.name()).collect();
                anyhow::anyhow!(
                    "unknown section '{s}' (valid sections: {})",
                    names.join(", ")
                )
            })
    }

    fn render(self, data: &HistoryData) -> String {
        match self {
            Section::History => render_recent_checkpoints(data),
            Section::NextSteps => render_next_steps(data),
            Section::Patterns => render_patterns(data),
            Section::Decisions => render_decisions(data),
            Section::Failed => render_failed(data),
        }
    }

    fn to_json(self, data: &HistoryData) -> anyhow::Result<serde_json::Value> {
        Ok(match self {
            Section::History => serde_json::to_value(&data.entries)?,
            Section::NextSteps => serde_json::to_value(rank_next_steps(&data.next_steps))?,
            Section::Patterns => serde_json::to_value(&data.patterns)?,
            Section::Decisions => serde_json::to_value(&data.decisions)?,
            Section::Failed => serde_json::to_value(&data.failed_approaches)?,
        })
    }
}

pub fn run(
    root: &Path,
    section: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let sections = match section {
        Some(s) => vec![Section::parse(s)?],
        None => Section::ALL.to_vec(),
    };
    let limit = super::history_limit(root, limit)?;
    let data = load_history_from_root(root, limit).context("failed to read changelog")?;

    if json {
        let mut out = serde_json::Map::new();
        for sec in &sections {
            out.insert(sec.name().to_string(), sec.to_json(&data)?);
        }
        return print_json(&out);
    }

    for (i, sec) in sections.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", sec.render(&data));
    }
    Ok(())
}
