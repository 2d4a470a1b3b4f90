//! Binary to generate/update .expected.html and .expected.err files
//!
//! Usage:
//!   cargo run --bin accept_expected            # Update all
//!   cargo run --bin accept_expected -- each    # Update only cases matching "each"

use adom::{CompileOptions, Compiler, MemoryFs, RenderOptions, Value};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let case_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases");

    // Cases import each other, so every file is loaded up front and
    // compiled from memory with paths relative to the case directory.
    let mut memory = MemoryFs::new();
    let mut cases = Vec::new();
    for entry in WalkDir::new(&case_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|s| s == "adom"))
    {
        let Ok(relative) = entry.path().strip_prefix(&case_dir) else {
            continue;
        };
        match fs::read_to_string(entry.path()) {
            Ok(text) => memory.insert(relative, text),
            Err(e) => {
                eprintln!("Failed to read {:?}: {}", entry.path(), e);
                continue;
            }
        }
        cases.push(relative.to_path_buf());
    }
    cases.sort();

    let mut updated = 0;
    let mut skipped = 0;

    for relative in cases {
        let path_str = relative.to_string_lossy();
        if path_str.contains("/lib/") || path_str.starts_with("lib/") {
            continue;
        }

        if let Some(ref f) = filter {
            if !path_str.contains(f) {
                skipped += 1;
                continue;
            }
        }

        process_case(&memory, &case_dir, &relative);
        updated += 1;
    }

    println!("Updated {} cases, skipped {}", updated, skipped);
}

fn process_case(memory: &MemoryFs, case_dir: &Path, relative: &Path) {
    let path = case_dir.join(relative);
    let is_error_test = relative.starts_with("errors");

    let input = match fs::read_to_string(path.with_extension("json")) {
        Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => Value::from(json),
            Err(e) => {
                eprintln!("Invalid input for {:?}: {}", path, e);
                return;
            }
        },
        Err(_) => Value::empty_object(),
    };

    let result = Compiler::new(memory.clone(), CompileOptions::default())
        .compile(relative)
        .map_err(|e| e.render())
        .and_then(|artifact| {
            let options = RenderOptions {
                script: Some(String::new()),
                ..RenderOptions::default()
            };
            adom::render(&artifact, &input, &options).map_err(|e| e.render(&artifact.sources))
        });

    match result {
        Ok(html) => {
            if is_error_test {
                eprintln!("ERROR: {:?} is in errors/ but rendered successfully", path);
                return;
            }
            write(&path.with_extension("expected.html"), &html);

            // Remove any stale .expected.err if this now renders
            let expected_err = path.with_extension("expected.err");
            if expected_err.exists() {
                let _ = fs::remove_file(&expected_err);
            }
        }
        Err(diagnostic) => {
            if is_error_test {
                write(&path.with_extension("expected.err"), &diagnostic);
            } else {
                eprintln!("ERROR: {:?} failed but is not in errors/:{}", path, diagnostic);
            }
        }
    }
}

fn write(path: &Path, text: &str) {
    if let Err(e) = fs::write(path, text) {
        eprintln!("Failed to write {:?}: {}", path, e);
    } else {
        println!("  wrote {}", path.display());
    }
}
