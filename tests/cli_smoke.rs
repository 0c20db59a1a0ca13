use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn taskdeck_help_works() {
    Command::cargo_bin("taskdeck")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("tasks, goals and calendar"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = ["init", "task", "event", "goal", "sync", "reconcile"];

    for cmd in subcommands {
        Command::cargo_bin("taskdeck")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn nested_help_works() {
    let nested = [
        ["task", "add"],
        ["task", "edit"],
        ["event", "move"],
        ["goal", "add-task"],
        ["sync", "replay"],
    ];

    for args in nested {
        Command::cargo_bin("taskdeck")
            .expect("binary")
            .args(args)
            .arg("--help")
            .assert()
            .success();
    }
}
