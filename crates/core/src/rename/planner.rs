//! Output-path planning for the three extraction modes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SieveError};
use crate::rename::template::Template;
use crate::scrape::ScrapedVars;
use crate::scrape::sanitize::{MAX_COMPONENT_LEN, sanitize_filename};
use crate::select::group::PageGroup;

/// How many output documents an extraction produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// One document with every selected page.
    #[default]
    Single,
    /// One document per page.
    Separate,
    /// One document per group.
    Grouped,
}

/// Naming options gathered from the CLI.
#[derive(Debug, Default)]
pub struct NamingOptions {
    /// User template; `None` means the default
    /// `{original_name}_pages{range}.pdf`.
    pub template: Option<Template>,
    /// Already-formatted prefix (custom prefix or timestamp) prepended to
    /// every filename.
    pub prefix: Option<String>,
}

/// One planned output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub path: PathBuf,
    /// Pages in final output order.
    pub pages: Vec<usize>,
}

/// The full plan for one source document.
#[derive(Debug)]
pub struct FilenamePlan {
    pub mode: ExtractMode,
    pub entries: Vec<PlanEntry>,
}

/// Plan output paths for the deduplicated `groups` of `source`.
///
/// `range_label` is the selection's raw label (the `{range}` built-in for
/// single mode); separate mode substitutes a zero-padded page number and
/// grouped mode the group's sanitized spec.
pub fn plan_filenames(
    source: &Path,
    groups: &[PageGroup],
    mode: ExtractMode,
    vars: &ScrapedVars,
    range_label: &str,
    options: &NamingOptions,
) -> Result<FilenamePlan> {
    let groups: Vec<&PageGroup> = groups.iter().filter(|g| !g.pages.is_empty()).collect();
    if groups.is_empty() {
        return Err(SieveError::input("no pages selected, nothing to extract"));
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    let all_pages: Vec<usize> = union_in_order(&groups);
    let width = groups
        .iter()
        .flat_map(|g| g.pages.iter())
        .max()
        .map(|max| max.to_string().len())
        .unwrap_or(1);

    let entries = match mode {
        ExtractMode::Single => {
            let name = render_name(options, vars, &stem, range_label, all_pages.len())?;
            vec![PlanEntry {
                path: dir.join(apply_prefix(options, &name)),
                pages: all_pages,
            }]
        }
        ExtractMode::Separate => {
            let mut entries = Vec::new();
            for group in &groups {
                for page in group.emit_order() {
                    let page_label = format!("{page:0width$}");
                    let name = match &options.template {
                        Some(_) => render_name(options, vars, &stem, &page_label, 1)?,
                        None => format!("{stem}_page{page_label}.pdf"),
                    };
                    entries.push(PlanEntry {
                        path: dir.join(apply_prefix(options, &name)),
                        pages: vec![page],
                    });
                }
            }
            entries
        }
        ExtractMode::Grouped => {
            let mut entries = Vec::new();
            for group in &groups {
                let pages = group.emit_order();
                let spec_label = sanitize_filename(&group.original_spec, MAX_COMPONENT_LEN);
                let name = match &options.template {
                    Some(_) => render_name(options, vars, &stem, &spec_label, pages.len())?,
                    None if pages.len() == 1 => {
                        format!("{stem}_page{:0width$}.pdf", pages[0])
                    }
                    None => format!("{stem}_{spec_label}.pdf"),
                };
                entries.push(PlanEntry {
                    path: dir.join(apply_prefix(options, &name)),
                    pages,
                });
            }
            entries
        }
    };

    Ok(FilenamePlan { mode, entries })
}

/// Union of group pages in output order: groups in list order, each group
/// in its own emit order, later duplicates skipped.
fn union_in_order(groups: &[&PageGroup]) -> Vec<usize> {
    let preserve_any = groups.iter().any(|g| g.preserve_order);
    let mut seen = std::collections::BTreeSet::new();
    let mut pages = Vec::new();
    for group in groups {
        for page in group.emit_order() {
            if seen.insert(page) {
                pages.push(page);
            }
        }
    }
    if !preserve_any {
        pages.sort_unstable();
    }
    pages
}

/// With no user template the default name is formatted directly, keeping
/// the range label verbatim; template placeholders always sanitize.
fn render_name(
    options: &NamingOptions,
    vars: &ScrapedVars,
    stem: &str,
    range_label: &str,
    page_count: usize,
) -> Result<String> {
    let Some(template) = &options.template else {
        return Ok(format!("{stem}_pages{range_label}.pdf"));
    };
    let built_ins = BTreeMap::from([
        ("original_name", stem.to_string()),
        ("range", range_label.to_string()),
        ("page_count", page_count.to_string()),
    ]);
    Ok(template.render(vars, &built_ins))
}

fn apply_prefix(options: &NamingOptions, name: &str) -> String {
    match &options.prefix {
        Some(prefix) => format!("{}_{name}", sanitize_filename(prefix, MAX_COMPONENT_LEN)),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_vars() -> ScrapedVars {
        ScrapedVars::new()
    }

    fn groups() -> Vec<PageGroup> {
        vec![
            PageGroup::new(vec![3, 4, 5], true, "3-5"),
            PageGroup::new(vec![9], false, "9"),
        ]
    }

    #[test]
    fn single_mode_default_name() {
        let plan = plan_filenames(
            Path::new("/docs/report.pdf"),
            &groups(),
            ExtractMode::Single,
            &no_vars(),
            "3-5,9",
            &NamingOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(
            plan.entries[0].path,
            Path::new("/docs/report_pages3-5,9.pdf")
        );
        assert_eq!(plan.entries[0].pages, vec![3, 4, 5, 9]);
    }

    #[test]
    fn separate_mode_zero_pads() {
        let mut gs = groups();
        gs.push(PageGroup::new(vec![12], false, "12"));
        let plan = plan_filenames(
            Path::new("/docs/report.pdf"),
            &gs,
            ExtractMode::Separate,
            &no_vars(),
            "x",
            &NamingOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.entries.len(), 5);
        assert_eq!(plan.entries[0].path, Path::new("/docs/report_page03.pdf"));
        assert_eq!(plan.entries[4].path, Path::new("/docs/report_page12.pdf"));
    }

    #[test]
    fn grouped_mode_uses_group_specs() {
        let plan = plan_filenames(
            Path::new("/docs/report.pdf"),
            &groups(),
            ExtractMode::Grouped,
            &no_vars(),
            "x",
            &NamingOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].path, Path::new("/docs/report_3-5.pdf"));
        assert_eq!(plan.entries[0].pages, vec![3, 4, 5]);
        assert_eq!(plan.entries[1].path, Path::new("/docs/report_page9.pdf"));
    }

    #[test]
    fn preserve_order_survives_into_single_mode() {
        let gs = vec![
            PageGroup::ordered(vec![5], false, "5"),
            PageGroup::ordered(vec![1], false, "1"),
            PageGroup::ordered(vec![3], false, "3"),
        ];
        let plan = plan_filenames(
            Path::new("a.pdf"),
            &gs,
            ExtractMode::Single,
            &no_vars(),
            "5,1,3",
            &NamingOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.entries[0].pages, vec![5, 1, 3]);
    }

    #[test]
    fn custom_template_and_prefix() {
        let options = NamingOptions {
            template: Some(Template::parse("{company}_{range}.pdf").unwrap()),
            prefix: Some("batch 1".to_string()),
        };
        let mut vars = ScrapedVars::new();
        vars.insert("company".to_string(), Some("ACME".to_string()));
        let plan = plan_filenames(
            Path::new("/docs/in.pdf"),
            &groups(),
            ExtractMode::Single,
            &vars,
            "3-5,9",
            &options,
        )
        .unwrap();
        // Template values sanitize, so the comma in the range label
        // becomes a dash.
        assert_eq!(
            plan.entries[0].path,
            Path::new("/docs/batch-1_ACME_3-5-9.pdf")
        );
    }

    #[test]
    fn empty_groups_are_an_error() {
        let err = plan_filenames(
            Path::new("a.pdf"),
            &[],
            ExtractMode::Single,
            &no_vars(),
            "x",
            &NamingOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no pages"));
    }
}
