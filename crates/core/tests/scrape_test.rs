//! End-to-end tests for scraping plus template-driven renaming.

use std::collections::BTreeMap;
use std::path::Path;

use pagesieve_core::analyzer::{AnalyzerCache, MemoryAnalyzer};
use pagesieve_core::rename::planner::{ExtractMode, NamingOptions, plan_filenames};
use pagesieve_core::rename::template::Template;
use pagesieve_core::scrape::extract::ScrapeEngine;
use pagesieve_core::scrape::pattern::parse_pattern_set;
use pagesieve_core::select::parser::SelectionParser;

#[test]
fn scrape_and_template_scenario() {
    // The company name sits on the line above the keyword, the invoice
    // number one word to the right of its keyword.
    let backend = MemoryAnalyzer::from_texts(&[
        "ACME Corp\nCompany Details\nInvoice Number: INV-001",
        "terms and conditions",
    ]);
    let cache = AnalyzerCache::new(&backend);

    let patterns = parse_pattern_set(&[
        "invoice=Invoice Number:r1wd1".to_string(),
        "company=Company:u1ln1".to_string(),
    ])
    .unwrap();

    let vars = ScrapeEngine::new(1).scrape(&patterns, &cache).unwrap();
    assert_eq!(vars["invoice"], Some("INV-001".to_string()));
    assert_eq!(vars["company"], Some("ACME-Corp".to_string()));

    let sel = SelectionParser::new(&cache).parse("1").unwrap();
    assert_eq!(sel.range_label, "1");

    let template = Template::parse("{company}_{invoice}_pages{range}.pdf").unwrap();
    let built_ins = BTreeMap::from([
        ("original_name", "source".to_string()),
        ("range", sel.range_label.clone()),
        ("page_count", sel.pages.len().to_string()),
    ]);
    assert_eq!(
        template.render(&vars, &built_ins),
        "ACME-Corp_INV-001_pages1.pdf"
    );
}

#[test]
fn scrape_feeds_the_planner() {
    let backend = MemoryAnalyzer::from_texts(&["Vendor: Initech\nPO: 4411"]);
    let cache = AnalyzerCache::new(&backend);
    let patterns = parse_pattern_set(&[
        "vendor=Vendor:r1wd1".to_string(),
        "po=PO:r1nb1".to_string(),
    ])
    .unwrap();
    let vars = ScrapeEngine::new(1).scrape(&patterns, &cache).unwrap();

    let sel = SelectionParser::new(&cache).parse("1").unwrap();
    let options = NamingOptions {
        template: Some(Template::parse("{vendor}_{po}.pdf").unwrap()),
        prefix: None,
    };
    let plan = plan_filenames(
        Path::new("/in/orders.pdf"),
        &sel.groups,
        ExtractMode::Single,
        &vars,
        &sel.range_label,
        &options,
    )
    .unwrap();
    assert_eq!(plan.entries[0].path, Path::new("/in/Initech_4411.pdf"));
}

#[test]
fn failed_extraction_uses_fallback_then_sentinel() {
    let backend = MemoryAnalyzer::from_texts(&["nothing relevant here"]);
    let cache = AnalyzerCache::new(&backend);
    let patterns = parse_pattern_set(&["total=Grand Total:r1nb1".to_string()]).unwrap();
    let vars = ScrapeEngine::new(1).scrape(&patterns, &cache).unwrap();
    assert_eq!(vars["total"], None);

    let built_ins = BTreeMap::from([("range", "1".to_string())]);
    let with_fallback = Template::parse("{total|NOTOTAL}_{range}.pdf").unwrap();
    assert_eq!(with_fallback.render(&vars, &built_ins), "NOTOTAL_1.pdf");

    let without = Template::parse("{total}_{range}.pdf").unwrap();
    assert_eq!(without.render(&vars, &built_ins), "NO-TOTAL_1.pdf");
}

#[test]
fn multi_page_scrape_with_page_spec() {
    let backend = MemoryAnalyzer::from_texts(&[
        "Case: 100",
        "Case: 200",
        "Case: 300",
        "summary",
    ]);
    let cache = AnalyzerCache::new(&backend);

    let patterns = parse_pattern_set(&["Case:r1nb1pg1-3".to_string()]).unwrap();
    let vars = ScrapeEngine::new(1).scrape(&patterns, &cache).unwrap();
    assert_eq!(vars["case"], Some("100-200-300".to_string()));
}

#[test]
fn trimmers_shape_scraped_values() {
    let backend =
        MemoryAnalyzer::from_texts(&["Reference: DRAFT AK-2024-001 FINAL\nbody"]);
    let cache = AnalyzerCache::new(&backend);
    // Take the rest of the line, drop the leading word and trailing word.
    let patterns =
        parse_pattern_set(&["refno=Reference:r1wd0^wd1$wd1".to_string()]).unwrap();
    let vars = ScrapeEngine::new(1).scrape(&patterns, &cache).unwrap();
    assert_eq!(vars["refno"], Some("AK-2024-001".to_string()));
}
