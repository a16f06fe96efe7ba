use larpix_schema::resolve_version;
use serde::Serialize;

use crate::cmd::ResolveArgs;
use crate::exit::{schema_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ResolveOutput<'a> {
    requested: &'a str,
    file_version: &'a str,
    resolved: String,
}

pub fn run(args: ResolveArgs, format: OutputFormat) -> CliResult<i32> {
    let resolved = resolve_version(Some(&args.requested), &args.file_version)
        .map_err(|err| schema_error("cannot resolve version", err))?;

    match format {
        OutputFormat::Json => print_json(&ResolveOutput {
            requested: &args.requested,
            file_version: &args.file_version,
            resolved: resolved.to_string(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "{} against file {} -> {resolved}",
            args.requested, args.file_version
        ),
        OutputFormat::Raw => println!("{resolved}"),
    }
    Ok(SUCCESS)
}
