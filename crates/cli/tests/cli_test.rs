//! End-to-end tests for the pagesieve binary against fixture PDFs built
//! with lopdf.

use std::path::{Path, PathBuf};
use std::process::Command;

use lopdf::{Document, Object, Stream, dictionary};

/// Build a PDF with one line of text per page.
fn build_pdf(path: &Path, page_texts: &[&str]) {
    let mut doc = Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for text in page_texts {
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => resources,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_ids.len() as i64,
    });
    for &page_id in &page_ids {
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).unwrap();
}

fn run(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_pagesieve"))
        .args(args)
        .output()
        .expect("failed to run pagesieve");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

fn fixture(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
    let path = dir.join(name);
    build_pdf(&path, texts);
    path
}

#[test]
fn extracts_a_numeric_range() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one", "two", "three", "four"]);

    let (code, stdout, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "2-3",
        "--batch",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("wrote"));

    let out = dir.path().join("in_pages2-3.pdf");
    assert!(out.exists(), "expected {}", out.display());
    assert_eq!(page_count(&out), 2);
}

#[test]
fn separate_files_one_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one", "two", "three"]);

    let (code, _, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "1,3",
        "--separate-files",
        "--batch",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(dir.path().join("in_page1.pdf").exists());
    assert!(dir.path().join("in_page3.pdf").exists());
    assert!(!dir.path().join("in_page2.pdf").exists());
}

#[test]
fn content_selector_finds_pages() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(
        dir.path(),
        "in.pdf",
        &["Chapter One intro", "body text", "Chapter Two intro", "body text"],
    );

    let (code, _, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "contains:'Chapter'",
        "--batch",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let outputs: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n != "in.pdf")
        .collect();
    assert_eq!(outputs.len(), 1, "outputs: {outputs:?}");
    assert_eq!(page_count(&dir.path().join(&outputs[0])), 2);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one", "two"]);

    let (code, stdout, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "1",
        "--dry-run",
        "--batch",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("would write"));
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        1,
        "only the fixture may exist"
    );
}

#[test]
fn invalid_selector_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one"]);

    let (code, _, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "nonsense",
        "--batch",
    ]);
    assert_eq!(code, 1);
    assert!(stderr.contains("nonsense"), "stderr: {stderr}");
}

#[test]
fn conflicting_operations_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one"]);

    let (code, _, stderr) = run(&[pdf.to_str().unwrap(), "--split-pages", "--optimize"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("one operation"), "stderr: {stderr}");
}

#[test]
fn analyze_reports_page_count() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one", "two", "three"]);

    let (code, stdout, stderr) = run(&[pdf.to_str().unwrap(), "--analyze"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("3 pages"), "stdout: {stdout}");
}

#[test]
fn analyze_detailed_emits_json() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one", "two"]);

    let (code, stdout, _) = run(&[pdf.to_str().unwrap(), "--analyze-detailed"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["pages"], 2);
    assert_eq!(parsed["page_details"].as_array().unwrap().len(), 2);
}

#[test]
fn dump_text_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["Alpha line", "Beta line"]);
    let out = dir.path().join("dump.txt");

    let (code, _, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--dump-text",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("=== Page 1 ==="));
    assert!(text.contains("Alpha"));
    assert!(text.contains("Beta"));
}

#[test]
fn scrape_text_prints_variables() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["Invoice: INV-42 total"]);

    let (code, stdout, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--scrape-text",
        "--scrape-pattern",
        "invoice=Invoice:r1wd1",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("invoice = INV-42"), "stdout: {stdout}");
}

#[test]
fn scraped_variables_drive_the_template() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["Vendor: Initech rest"]);

    let (code, _, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "1",
        "--scrape-pattern",
        "vendor=Vendor:r1wd1",
        "--filename-template",
        "{vendor}_p{range}.pdf",
        "--batch",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(dir.path().join("Initech_p1.pdf").exists());
}

#[test]
fn conflict_rename_in_batch_mode() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["one", "two"]);

    for _ in 0..2 {
        let (code, _, stderr) = run(&[
            pdf.to_str().unwrap(),
            "--extract-pages",
            "1",
            "--batch",
        ]);
        assert_eq!(code, 0, "stderr: {stderr}");
    }
    assert!(dir.path().join("in_pages1.pdf").exists());
    assert!(dir.path().join("in_pages1_1.pdf").exists());
}

#[test]
fn version_flag_works() {
    let (code, stdout, _) = run(&["--version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pagesieve"));
}

#[test]
fn respect_groups_writes_one_file_per_group() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "in.pdf", &["a", "b", "c", "d", "e"]);

    let (code, _, stderr) = run(&[
        pdf.to_str().unwrap(),
        "--extract-pages",
        "1-2,4-5",
        "--respect-groups",
        "--batch",
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(dir.path().join("in_1-2.pdf").exists());
    assert!(dir.path().join("in_4-5.pdf").exists());
    assert_eq!(page_count(&dir.path().join("in_1-2.pdf")), 2);
}
