use assert_cmd::Command;
use predicates::prelude::*;

fn bot() -> Command {
    Command::cargo_bin("ytmusic-bot").unwrap()
}

#[test]
fn validate_accepts_youtube_music_link() {
    bot()
        .args(["validate", "https://music.youtube.com/watch?v=dQw4w9WgXcQ"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dQw4w9WgXcQ"));
}

#[test]
fn validate_rejects_short_identifier() {
    bot()
        .args(["validate", "https://youtube.com/watch?v=short"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a supported"));
}

#[test]
fn help_lists_subcommands() {
    bot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("validate")));
}

#[test]
fn run_without_token_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    bot()
        .current_dir(dir.path())
        .env_remove("TELEGRAM_TOKEN")
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["run", "--yt-dlp", "definitely-not-a-real-yt-dlp-binary"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_TOKEN"));
}
