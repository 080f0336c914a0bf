//! Integration tests: encode the sample files in tests/samples/ and decode
//! them again.

use lmx::batch::check_part;
use lmx::{
    decode_file, encode_score, linearize, parse_file, parse_musicxml, split_to_systems,
    to_musicxml, part_to_score, DelinearizeOptions, Flavor, LmxFile, Score,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

/// Get the path to the samples directory.
fn samples_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/samples")
}

fn load(name: &str) -> Score {
    let path = samples_dir().join(name);
    let (score, diagnostics) =
        parse_file(&path).unwrap_or_else(|e| panic!("Failed to parse {name}: {e}"));
    assert!(diagnostics.is_empty(), "{name}: {diagnostics:?}");
    score
}

// ─── Parsing ─────────────────────────────────────────────────────────

#[test]
fn parse_grand_staff_sample() {
    let score = load("grand_staff.musicxml");
    assert_eq!(score.title.as_deref(), Some("Minuet in D"));
    assert_eq!(score.composer.as_deref(), Some("Anonymous"));
    assert_eq!(score.version.as_deref(), Some("4.0"));
    assert_eq!(score.parts.len(), 1);

    let part = &score.parts[0];
    assert_eq!(part.name, "Piano");
    assert_eq!(part.measures.len(), 4);
    assert!(part.measures[2].new_system);

    let attrs = part.measures[0].head_attributes().expect("first measure has attributes");
    assert_eq!(attrs.divisions, Some(4));
    assert_eq!(attrs.staves, Some(2));
    assert_eq!(attrs.clefs.len(), 2);
    println!("✓ grand_staff.musicxml: {} measures", part.measures.len());
}

// ─── Round trips ─────────────────────────────────────────────────────

#[test]
fn samples_round_trip_per_system() {
    for (name, systems) in [("grand_staff.musicxml", 2), ("tuplets_and_grace.musicxml", 1)] {
        let score = load(name);
        let checks = check_part(&score.parts[0]).expect("check should run");
        assert_eq!(checks.len(), systems, "{name}");
        for check in checks {
            assert!(
                check.diagnostics.is_empty(),
                "{name} system {}: {:?}",
                check.system,
                check.diagnostics
            );
            assert!(check.matches, "{name} system {} differs after decoding", check.system);
        }
        println!("✓ {name}: {systems} systems round-trip");
    }
}

#[test]
fn first_measure_tokens() {
    let score = load("grand_staff.musicxml");
    let pages = split_to_systems(&score.parts[0]);
    let (tokens, diagnostics) = linearize(&pages[0].systems[0].part);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let second_measure = tokens
        .iter()
        .skip(1)
        .position(|t| t == "measure")
        .map_or(tokens.len(), |i| i + 1);
    assert_eq!(
        tokens[..second_measure].join(" "),
        "measure key:fifths:2 time beats:3 beat-type:4 clef:G2 staff:1 clef:F4 staff:2 \
         D5 voice:1 quarter stem:down staff:1 F5 eighth beam:begin E5 eighth beam:end \
         A4 quarter stem:up chord D5 quarter \
         backup half backup quarter D3 voice:5 half dot stem:up staff:2"
    );
    println!("✓ first measure encodes as expected");
}

#[test]
fn lmx_file_round_trips_through_musicxml() {
    let score = load("grand_staff.musicxml");
    let (file, diagnostics) = encode_score(&score);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(file.flavor, Flavor::Core);
    assert_eq!(file.systems.len(), 2);

    // through text and back
    let file: LmxFile = file.to_string().parse().expect("LMX file should parse");
    let (part, diagnostics) = decode_file(&file, &DelinearizeOptions::default());
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    // through MusicXML and back
    let xml = to_musicxml(&part_to_score(part));
    let (reparsed, diagnostics) = parse_musicxml(&xml).expect("written MusicXML should parse");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let (again, diagnostics) = encode_score(&reparsed);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(again.systems, file.systems);
    println!("✓ LMX → MusicXML → LMX is stable");
}

#[test]
fn extended_notations_mark_the_file_flavor() {
    let score = load("tuplets_and_grace.musicxml");
    let (file, diagnostics) = encode_score(&score);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(file.flavor, Flavor::Extended);

    let tokens = &file.systems[0];
    for expected in ["grace", "grace:slash", "3in2", "tuplet:start", "beam:backward-hook", "forward", "fermata"] {
        assert!(tokens.iter().any(|t| t == expected), "missing '{expected}'");
    }
    // continue beams are implied
    assert!(!tokens.iter().any(|t| t == "beam:continue"));
    println!("✓ tuplets_and_grace.musicxml encodes as the extended flavor");
}
