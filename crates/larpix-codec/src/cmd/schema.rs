use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use larpix_schema::{Layout, SchemaRegistry, SchemaVersion};
use serde::Serialize;

use crate::cmd::SchemaArgs;
use crate::exit::{schema_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct SchemaOutput<'a> {
    version: SchemaVersion,
    latest: bool,
    datasets: Vec<&'a Layout>,
}

pub fn run(args: SchemaArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = SchemaRegistry::builtin();
    let version: SchemaVersion = args
        .version
        .parse()
        .map_err(|err| schema_error("invalid version", err))?;
    let layout = registry
        .get(version)
        .map_err(|err| schema_error("unknown version", err))?;

    let out = SchemaOutput {
        version,
        latest: registry.latest() == Some(version),
        datasets: layout.datasets().collect(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DATASET", "COLUMN", "TYPE"]);
            for dataset in &out.datasets {
                for column in dataset.columns() {
                    table.add_row(vec![
                        dataset.dataset().to_string(),
                        column.name.to_string(),
                        column.ty.to_string(),
                    ]);
                }
            }
            println!("version {version}");
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for dataset in &out.datasets {
                let columns: Vec<String> = dataset
                    .columns()
                    .iter()
                    .map(|column| format!("{}:{}", column.name, column.ty))
                    .collect();
                println!("{}[{}] {}", dataset.dataset(), version, columns.join(" "));
            }
        }
    }
    Ok(SUCCESS)
}
