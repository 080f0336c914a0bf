use std::env;
use std::fs;
use std::io;
use std::process;

use lmx::{DelinearizeOptions, Diagnostics, LmxFile};

const USAGE: &str = "\
Usage: lmx linearize <input.musicxml|input.mxl> [output.lmx] [--strict]
       lmx delinearize <input.lmx|-> [output.musicxml] [--keep-fractional] [--strict]
       lmx check <input.musicxml|input.mxl> [--strict] [--json]";

struct Args {
    command: String,
    paths: Vec<String>,
    strict: bool,
    keep_fractional: bool,
    json: bool,
}

fn main() {
    let args = parse_args();

    let result = match args.command.as_str() {
        "linearize" => run_linearize(&args),
        "delinearize" => run_delinearize(&args),
        "check" => run_check(&args),
        other => Err(format!("Unknown command '{other}'\n{USAGE}")),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn parse_args() -> Args {
    let raw: Vec<String> = env::args().skip(1).collect();

    let mut args = Args {
        command: String::new(),
        paths: Vec::new(),
        strict: false,
        keep_fractional: false,
        json: false,
    };
    for arg in raw {
        match arg.as_str() {
            "--strict" => args.strict = true,
            "--keep-fractional" => args.keep_fractional = true,
            "--json" => args.json = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            flag if flag.starts_with("--") => {
                eprintln!("Unknown option '{flag}'\n{USAGE}");
                process::exit(1);
            }
            _ if args.command.is_empty() => args.command = arg,
            _ => args.paths.push(arg),
        }
    }

    if args.command.is_empty() || args.paths.is_empty() {
        eprintln!("{USAGE}");
        process::exit(1);
    }
    args
}

/// Print diagnostics to stderr; in strict mode the first one fails the run.
fn report(diagnostics: Diagnostics, strict: bool) -> Result<(), String> {
    for diagnostic in &diagnostics {
        eprintln!("{diagnostic}");
    }
    if strict {
        diagnostics.into_result().map_err(|e| format!("Strict mode: {e}"))?;
    }
    Ok(())
}

fn write_output(path: Option<&String>, content: &str, what: &str) -> Result<(), String> {
    match path {
        Some(path) => {
            fs::write(path, content).map_err(|e| format!("Error writing to '{path}': {e}"))?;
            eprintln!("Wrote {what} to {path}");
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn run_linearize(args: &Args) -> Result<(), String> {
    let input = &args.paths[0];
    let (score, mut diagnostics) =
        lmx::parse_file(input).map_err(|e| format!("Error reading '{input}': {e}"))?;

    let (file, encode_diagnostics) = lmx::encode_score(&score);
    diagnostics.extend(encode_diagnostics);
    report(diagnostics, args.strict)?;

    write_output(args.paths.get(1), &file.to_string(), "LMX")
}

fn run_delinearize(args: &Args) -> Result<(), String> {
    let input = &args.paths[0];
    let text = if input == "-" {
        io::read_to_string(io::stdin()).map_err(|e| format!("Error reading stdin: {e}"))?
    } else {
        fs::read_to_string(input).map_err(|e| format!("Error reading file '{input}': {e}"))?
    };
    let file: LmxFile = text.parse().map_err(|e| format!("Error in '{input}': {e}"))?;

    let options = DelinearizeOptions {
        keep_fractional_durations: args.keep_fractional,
    };
    let (part, diagnostics) = lmx::decode_file(&file, &options);
    report(diagnostics, args.strict)?;

    let xml = lmx::to_musicxml(&lmx::part_to_score(part));
    write_output(args.paths.get(1), &xml, "MusicXML")
}

fn run_check(args: &Args) -> Result<(), String> {
    let input = &args.paths[0];
    let (score, mut diagnostics) =
        lmx::parse_file(input).map_err(|e| format!("Error reading '{input}': {e}"))?;

    let mut systems = 0;
    let mut mismatches = 0;
    for part in &score.parts {
        let checks = lmx::batch::check_part(part).map_err(|e| format!("Part '{}': {e}", part.id))?;
        for check in checks {
            systems += 1;
            if !check.matches {
                mismatches += 1;
                eprintln!(
                    "Part '{}', system {} (measure {}): decoded content differs",
                    part.id,
                    check.system + 1,
                    check.first_measure.map_or_else(|| "?".to_string(), |n| n.to_string())
                );
            }
            diagnostics.extend(check.diagnostics);
        }
    }

    if args.json {
        let json = lmx::diagnostics_to_json(&diagnostics).map_err(|e| format!("JSON error: {e}"))?;
        println!("{json}");
    }
    let total = diagnostics.len();
    report(diagnostics, args.strict)?;

    println!("{systems} systems, {mismatches} mismatches, {total} diagnostics");
    if args.strict && mismatches > 0 {
        return Err(format!("Strict mode: {mismatches} systems do not round-trip"));
    }
    Ok(())
}
