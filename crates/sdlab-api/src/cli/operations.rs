//! `sdlab operations`: list registered step types.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use sdlab_core::engine::OperationType;

pub fn list_operations(json: bool) -> Result<()> {
    if json {
        let ops: Vec<_> = OperationType::ALL
            .iter()
            .map(|op| {
                serde_json::json!({
                    "type": op.as_str(),
                    "name": op.display_name(),
                    "recoverable": op.is_recoverable(),
                    "checkpoint": op.completion_checkpoint(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&ops)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Type").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Recovery"),
            Cell::new("Checkpoint"),
        ]);

    for op in OperationType::ALL {
        table.add_row(vec![
            Cell::new(op.as_str()),
            Cell::new(op.display_name()),
            Cell::new(if op.is_recoverable() { "yes" } else { "" }),
            Cell::new(op.completion_checkpoint().unwrap_or("")),
        ]);
    }
    println!("{table}");
    Ok(())
}
