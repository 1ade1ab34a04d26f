use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::io::Read;
use weft_state::{codec, SavedState, StructuralEdit};

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Client-side state payload ("-" reads it from stdin)
    pub payload: String,

    /// Print the decoded state as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn decode(args: DecodeArgs) -> Result<()> {
    let payload = if args.payload == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        args.payload
    };

    let state = codec::decode_payload(payload.trim())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_summary(&state);
    }
    Ok(())
}

fn print_summary(state: &SavedState) {
    println!("{} {}", "view".dimmed(), state.view_id.bold());
    println!("{} {}", "sequence".dimmed(), state.sequence);
    println!("{} {}", "id counter".dimmed(), state.id_counter);

    if let Some(tree) = &state.full_tree {
        println!("{} full tree, {} node(s)", "mode".dimmed(), tree.node_count());
        return;
    }
    println!("{} partial", "mode".dimmed());

    for edit in &state.diff.structural_edits {
        match edit {
            StructuralEdit::Remove { client_id } => {
                println!("  {} remove {}", "-".red(), client_id);
            }
            StructuralEdit::Insert {
                parent_client_id,
                index,
                facet,
                descriptor,
            } => {
                let slot = match facet {
                    Some(name) => format!("facet '{}'", name),
                    None => format!("index {}", index),
                };
                println!(
                    "  {} insert {} ({}) under {} at {}",
                    "+".green(),
                    descriptor.id.as_deref().unwrap_or("?"),
                    descriptor.component_type,
                    parent_client_id,
                    slot
                );
            }
        }
    }

    for diff in &state.diff.attribute_diffs {
        let mut changes: Vec<String> = diff.set.keys().map(|k| format!("{}=…", k)).collect();
        changes.extend(diff.cleared.iter().map(|k| format!("-{}", k)));
        changes.extend(diff.bindings.keys().map(|k| format!("#{}", k)));
        println!("  {} {} {}", "~".yellow(), diff.client_id, changes.join(" "));
    }

    if !state.view_scope.is_empty() {
        let keys: Vec<&str> = state.view_scope.keys().map(String::as_str).collect();
        println!("{} {}", "view scope".dimmed(), keys.join(", "));
    }
}
