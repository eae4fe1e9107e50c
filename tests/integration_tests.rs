use assert_cmd::Command;
use predicates::str::contains;

fn chasm() -> Command {
    Command::cargo_bin("chasm").unwrap()
}

#[test]
fn runs_without_arguments() {
    chasm().assert().success().stdout(contains("chasm v"));
}

#[test]
fn assembles_to_image() {
    let dest = std::env::temp_dir().join("chasm_assembles_to_image.ch8");
    chasm()
        .arg("assemble")
        .arg("tests/files/digits.c8s")
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("Saved"));

    let image = std::fs::read(&dest).unwrap();
    assert_eq!(image.len(), 22);
    assert_eq!(&image[..4], &[0x00, 0xE0, 0x60, 0x00]);
    // Last instruction is `JP done` at 0x214
    assert_eq!(&image[20..], &[0x12, 0x14]);
}

#[test]
fn checks_valid_source() {
    chasm()
        .arg("check")
        .arg("tests/files/digits.c8s")
        .assert()
        .success()
        .stdout(contains("no errors found!"));
}

#[test]
fn rejects_forward_reference() {
    chasm()
        .arg("check")
        .arg("tests/files/forward.c8s")
        .assert()
        .failure()
        .stderr(contains("undeclared identifier"));
}

#[test]
fn warnings_do_not_fail() {
    chasm()
        .arg("check")
        .arg("tests/files/truncated.c8s")
        .assert()
        .success()
        .stderr(contains("does not fit in 8 bits"));
}

#[test]
fn disassembles_image() {
    let image = std::env::temp_dir().join("chasm_disassembles_image.ch8");
    std::fs::write(&image, [0x61, 0x04, 0xD1, 0x25, 0xFF]).unwrap();

    chasm()
        .arg("disasm")
        .arg(&image)
        .assert()
        .success()
        .stdout("0x200: LD V1, #0x04\n0x202: DRW V1, V2, #5\n0x204: .BYTE #0xFF\n");

    chasm()
        .arg("disasm")
        .arg(&image)
        .arg("--origin")
        .arg("0x300")
        .assert()
        .success()
        .stdout(contains("0x300: LD V1, #0x04"));
}

#[test]
fn runs_until_halted() {
    chasm()
        .arg("run")
        .arg("tests/files/digits.c8s")
        .assert()
        .success()
        .stdout(contains("Halted"))
        // Top rows of 0, 1, 2 and 3
        .stdout(contains(".####...#..####.####"))
        .stdout(contains("V0=04 V1=15 V2=01"))
        .stdout(contains("I=00F IP=214"));
}

#[test]
fn feeds_key_presses() {
    chasm()
        .arg("run")
        .arg("tests/files/keys.c8s")
        .arg("--press")
        .arg("a,5")
        .assert()
        .success()
        .stdout(contains("V3=0A V4=05"));

    chasm()
        .arg("run")
        .arg("tests/files/keys.c8s")
        .assert()
        .success()
        .stdout(contains("Waiting"));
}

#[test]
fn quirks_from_flag_and_env() {
    chasm()
        .arg("run")
        .arg("tests/files/shift.c8s")
        .assert()
        .success()
        .stdout(contains("V1=02"));

    chasm()
        .arg("run")
        .arg("tests/files/shift.c8s")
        .arg("--quirks")
        .arg("shift")
        .assert()
        .success()
        .stdout(contains("V1=04"));

    chasm()
        .env("CHASM_QUIRKS", "shift,bcd")
        .arg("run")
        .arg("tests/files/shift.c8s")
        .assert()
        .success()
        .stdout(contains("V1=04"));

    chasm()
        .arg("run")
        .arg("tests/files/shift.c8s")
        .arg("--quirks")
        .arg("nope")
        .assert()
        .failure()
        .stderr(contains("Unknown quirk"));
}

#[test]
fn rejects_unknown_extension() {
    chasm()
        .arg("run")
        .arg("Cargo.toml")
        .assert()
        .failure()
        .stderr(contains("unknown extension"));
}
