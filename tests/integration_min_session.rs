// Drives the compiled binary through a PTY so the real raw-mode loop and
// crossterm input handling run end to end.
//
// Notes:
// - Requires a TTY; uses expectrl which allocates a pseudo terminal.
// - Marked Unix-only and ignored by default to avoid CI/platform issues.
// - Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn sudden_death_session_ends_on_first_mistake() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("pitrain.db");
    let bin = assert_cmd::cargo::cargo_bin("pitrain");
    let cmd = format!("{} --db {} --mode test practice", bin.display(), db.display());

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    // five correct digits, then a wrong one ends the test
    p.send("14159")?;
    p.send("0")?;

    p.expect("5 correct")?;
    p.expect(Eof)?;
    Ok(())
}

#[test]
#[ignore]
fn escape_quits_a_practice_session() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("pitrain.db");
    let bin = assert_cmd::cargo::cargo_bin("pitrain");
    let cmd = format!("{} --db {} --mode practice practice", bin.display(), db.display());

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("141")?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("\x1b")?;

    p.expect(Eof)?;
    Ok(())
}

#[test]
#[ignore]
fn learn_segment_loops_back_to_its_start() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("pitrain.db");
    let bin = assert_cmd::cargo::cargo_bin("pitrain");
    let cmd = format!(
        "{} --db {} --mode learn --segment-start 0 --segment-end 10 practice",
        bin.display(),
        db.display()
    );

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("1415926535")?;
    p.expect("loop 2")?;
    p.send("14")?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("\x1b")?;

    p.expect("segment 0-10: 1 full loop(s)")?;
    p.expect(Eof)?;
    Ok(())
}
