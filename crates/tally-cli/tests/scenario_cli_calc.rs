use assert_cmd::Command;
use predicates::prelude::*;

fn tally() -> Command {
    Command::cargo_bin("tally").expect("tally binary built")
}

#[test]
fn calc_prints_the_value() {
    tally()
        .args(["calc", "2 ** 10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("value=1024"));

    tally()
        .args(["calc", "7 // 2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("value=3"));
}

#[test]
fn calc_reports_invalid_expressions() {
    tally()
        .args(["calc", "1 / 0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("division by zero"));

    tally()
        .args(["calc", "(1 + 2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("EXPR_INVALID"));

    tally()
        .args(["calc", "hello there"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("EXPR_NOT_A_NUMBER"));
}
