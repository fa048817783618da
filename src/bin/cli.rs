#![cfg(not(tarpaulin_include))]

use artist_splitter::upload::{ProcessSettings, UploadJob, process_upload};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} split <file> [--keyword <text>] [--out <dir>]", program);
    eprintln!("  {} pivot <file> <index_column> <value_column> [--out <dir>]", program);
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cli");

    // Split flags from positional arguments
    let mut positional = Vec::new();
    let mut keyword = "artist".to_string();
    let mut out_dir = PathBuf::from(".");
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--keyword" => match rest.next() {
                Some(value) => keyword = value.clone(),
                None => {
                    usage(program);
                    return ExitCode::from(2);
                }
            },
            "--out" => match rest.next() {
                Some(value) => out_dir = PathBuf::from(value),
                None => {
                    usage(program);
                    return ExitCode::from(2);
                }
            },
            "-h" | "--help" => {
                usage(program);
                return ExitCode::SUCCESS;
            }
            _ => positional.push(arg.clone()),
        }
    }

    let (action, path, index_column, value_column) = match positional.as_slice() {
        [action, path] if action == "split" => (action.clone(), path.clone(), None, None),
        [action, path, index, value] if action == "pivot" => (
            action.clone(),
            path.clone(),
            Some(index.clone()),
            Some(value.clone()),
        ),
        _ => {
            usage(program);
            return ExitCode::from(2);
        }
    };

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: could not read {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let job = UploadJob {
        filename: Path::new(&path)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string),
        bytes,
        action: Some(action),
        index_column,
        value_column,
    };
    let settings = ProcessSettings {
        keyword,
        enable_pivot: true,
        upload_dir: None,
        output_dir: Some(out_dir.clone()),
    };

    match process_upload(job, &settings) {
        Ok(file) => {
            println!(
                "Wrote {} ({} sheets)",
                out_dir.join(&file.filename).display(),
                file.sheets
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
