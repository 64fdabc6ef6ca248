use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use image::{ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 生成测试图片目录
#[fixture]
fn dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    let images = [
        ("a-red.png", [220, 20, 20]),
        ("b-dark-red.png", [200, 30, 30]),
        ("c-blue.png", [20, 20, 220]),
    ];
    for (name, color) in images {
        let path = dir.child(name);
        RgbImage::from_pixel(40, 30, Rgb(color)).save_with_format(path.path(), ImageFormat::Png).unwrap();
    }
    dir.child("notes.txt").write_str("not an image").unwrap();
    dir
}

#[rstest]
fn add_and_search(dataset: TempDir) -> Result<()> {
    let conf_dir = TempDir::new()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", dataset.path()).success();
    conf_dir.child("imsim.db").assert(predicate::path::exists());

    // 目录按文件名排序扫描，但图片是并发添加的，先通过 show 找到红色图片的 ID
    let mut red = None;
    for id in 1..=3 {
        let output = Command::cargo_bin("imsim")?
            .args(["-c", conf_dir.path().to_str().unwrap(), "show", &id.to_string()])
            .output()?;
        assert!(output.status.success());
        if String::from_utf8_lossy(&output.stdout).contains("a-red.png") {
            red = Some(id);
        }
    }
    let red = red.expect("red image not found");

    cargo_run!("imsim", "-c", conf_dir.path(), "search", red.to_string(), "--limit", "1")
        .success()
        .stdout(predicate::str::contains("b-dark-red.png"))
        .stdout(predicate::str::contains("c-blue.png").not());

    cargo_run!("imsim", "-c", conf_dir.path(), "search", red.to_string(), "--output-format", "json")
        .success()
        .stdout(predicate::str::contains("\"similarityScore\""));

    cargo_run!("imsim", "-c", conf_dir.path(), "history")
        .success()
        .stdout(predicate::str::contains("a-red.png"));

    Ok(())
}

#[rstest]
fn clear_history(dataset: TempDir) -> Result<()> {
    let conf_dir = TempDir::new()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", dataset.path()).success();
    cargo_run!("imsim", "-c", conf_dir.path(), "search", "1").success();
    cargo_run!("imsim", "-c", conf_dir.path(), "history", "--clear").success();
    cargo_run!("imsim", "-c", conf_dir.path(), "history").success().stdout(predicate::str::is_empty());

    // 图片不受影响
    cargo_run!("imsim", "-c", conf_dir.path(), "show", "3", "--output-format", "json")
        .success()
        .stdout(predicate::str::contains("\"dimension\": 128"));

    Ok(())
}

#[test]
fn search_missing_image() -> Result<()> {
    let conf_dir = TempDir::new()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "search", "42")
        .failure()
        .stderr(predicate::str::contains("42"));

    Ok(())
}
