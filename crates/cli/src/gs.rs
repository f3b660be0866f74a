//! Ghostscript repair wrappers.
//!
//! Rewriting a malformed PDF through `gs -sDEVICE=pdfwrite` deduplicates
//! resources and regenerates the xref table. The binary is probed once
//! per invocation; everything here shells out, nothing parses PDFs.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use tracing::{debug, info};

/// `-dPDFSETTINGS` presets.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum GsQuality {
    Screen,
    #[default]
    Ebook,
    Printer,
    Prepress,
    Default,
}

impl GsQuality {
    fn setting(self) -> &'static str {
        match self {
            GsQuality::Screen => "/screen",
            GsQuality::Ebook => "/ebook",
            GsQuality::Printer => "/printer",
            GsQuality::Prepress => "/prepress",
            GsQuality::Default => "/default",
        }
    }
}

/// True when a runnable `gs` binary is on PATH.
pub fn is_available() -> bool {
    Command::new("gs")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Rewrite `input` to `output` through pdfwrite.
pub fn fix_pdf(input: &Path, output: &Path, quality: GsQuality) -> Result<()> {
    debug!(input = %input.display(), output = %output.display(), "running ghostscript");
    let status = Command::new("gs")
        .arg("-sDEVICE=pdfwrite")
        .arg("-dCompatibilityLevel=1.4")
        .arg(format!("-dPDFSETTINGS={}", quality.setting()))
        .arg("-dNOPAUSE")
        .arg("-dQUIET")
        .arg("-dBATCH")
        .arg(format!("-sOutputFile={}", output.display()))
        .arg(input)
        .status()
        .context("failed to spawn gs (is Ghostscript installed?)")?;

    if !status.success() {
        bail!("ghostscript failed on {} (status {status})", input.display());
    }
    Ok(())
}

/// Fix one document next to itself. With `replace` the repaired file
/// takes the original's name; otherwise it lands at `<stem>_fixed.pdf`.
pub fn fix_in_place(input: &Path, quality: GsQuality, replace: bool) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));

    let fixed = dir.join(format!("{stem}_fixed.pdf"));
    fix_pdf(input, &fixed, quality)?;

    if replace {
        std::fs::rename(&fixed, input)
            .with_context(|| format!("replacing {}", input.display()))?;
        info!(path = %input.display(), "replaced original with repaired copy");
        Ok(input.to_path_buf())
    } else {
        info!(path = %fixed.display(), "wrote repaired copy");
        Ok(fixed)
    }
}

/// Repair a document into a temporary path, for the auto-fix retry when a
/// load fails. The caller owns the returned file.
pub fn fix_to_temp(input: &Path, quality: GsQuality) -> Result<PathBuf> {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let temp = dir.join(format!(".{name}.gsfix.tmp"));
    fix_pdf(input, &temp, quality)?;
    Ok(temp)
}
