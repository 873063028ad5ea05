// tests/end_to_end.rs
#![cfg(unix)]

mod common;

use std::error::Error;
use std::fs;
use std::path::Path;

use clap::Parser;
use rulegraph::cli::CliArgs;

type TestResult = Result<(), Box<dyn Error>>;

const CATALOG: &str = r#"
[switch.skip_merge]
default = false

[rule.split]
role = "per_unit"
output = "{working_dir}/split/{unit}.txt"
cmd = "echo pointing {unit} at {unit.time} > {output}"

[rule.merge]
role = "join"
unless = ["skip_merge"]
inputs = ["{working_dir}/split/{unit}.txt"]
output = "{output_dir}/merged.txt"
cmd = "cat {inputs} > {output}"

[rule.all]
role = "join"
inputs = [
    { path = "{output_dir}/merged.txt", unless = ["skip_merge"] },
    { path = "{working_dir}/split/{unit}.txt", when = ["skip_merge"] },
]
"#;

const CONFIG: &str = r#"
catalog = "catalog.toml"

[env]
working_dir = "work"
max_concurrency = 2

[units]
"0" = { time = "10:00" }
"1" = { time = "10:01" }
"#;

fn setup(dir: &Path) -> std::io::Result<std::path::PathBuf> {
    fs::write(dir.join("catalog.toml"), CATALOG)?;
    let config = dir.join("Rulegraph.toml");
    fs::write(&config, CONFIG)?;
    Ok(config)
}

fn args(config: &Path, extra: &[&str]) -> Result<CliArgs, clap::Error> {
    let config = config.to_string_lossy().into_owned();
    let mut argv = vec!["rulegraph", "--config", config.as_str()];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv)
}

#[tokio::test]
async fn full_run_then_resume() -> TestResult {
    common::init_tracing();
    let dir = tempfile::tempdir()?;
    let config = setup(dir.path())?;
    let work = dir.path().join("work");

    let code = rulegraph::run(args(&config, &[])?).await?;
    assert_eq!(code, 0);
    assert_eq!(
        fs::read_to_string(work.join("output/merged.txt"))?,
        "pointing 0 at 10:00\npointing 1 at 10:01\n"
    );
    assert!(work.join("logs/markers/all.done").exists());
    assert!(work.join("logs/split_1.log").exists());

    // Remove an intermediate product: the markers still say done.
    fs::remove_file(work.join("split/0.txt"))?;
    let code = rulegraph::run(args(&config, &[])?).await?;
    assert_eq!(code, 0);
    assert!(!work.join("split/0.txt").exists());

    // --force reruns everything.
    let code = rulegraph::run(args(&config, &["--force"])?).await?;
    assert_eq!(code, 0);
    assert!(work.join("split/0.txt").exists());
    Ok(())
}

#[tokio::test]
async fn dry_run_and_check_all_execute_nothing() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = setup(dir.path())?;
    let work = dir.path().join("work");

    assert_eq!(rulegraph::run(args(&config, &["--dry-run"])?).await?, 0);
    assert_eq!(rulegraph::run(args(&config, &["--check-all"])?).await?, 0);
    assert!(!work.exists());
    Ok(())
}

#[tokio::test]
async fn failing_command_gives_exit_code_one() -> TestResult {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("catalog.toml"),
        CATALOG.replace("cat {inputs} > {output}", "exit 7"),
    )?;
    let config = dir.path().join("Rulegraph.toml");
    fs::write(&config, CONFIG)?;

    assert_eq!(rulegraph::run(args(&config, &[])?).await?, 1);

    // With the join switched off, the failing rule is out of the graph.
    let code = rulegraph::run(args(&config, &["--set", "skip_merge=true"])?).await?;
    assert_eq!(code, 0);
    Ok(())
}

#[tokio::test]
async fn init_config_writes_a_template_once() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = setup(dir.path())?;
    let target = dir.path().join("starter.toml");
    let target_arg = target.to_string_lossy().into_owned();

    let code = rulegraph::run(args(&config, &["--init-config", target_arg.as_str()])?).await?;
    assert_eq!(code, 0);
    let text = fs::read_to_string(&target)?;
    assert!(text.contains("skip_merge = false"), "{text}");

    assert!(rulegraph::run(args(&config, &["--init-config", target_arg.as_str()])?).await.is_err());
    Ok(())
}

#[tokio::test]
async fn overwrite_lock_refuses_an_existing_working_dir() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = setup(dir.path())?;
    fs::create_dir_all(dir.path().join("work"))?;

    assert!(rulegraph::run(args(&config, &["--overwrite-lock"])?).await.is_err());
    Ok(())
}
