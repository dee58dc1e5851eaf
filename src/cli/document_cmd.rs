//! Single-document CLI commands: slug, assign, toc, check

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::output::Output;
use crate::domain::{
    assign_heading_ids_with, process_html, resolve, resolve_fragment_links, slug as make_slug,
    validate_heading_ladder, Document, GatePolicy, Heading, LadderViolation, UnresolvedEntry,
};
use crate::storage::Config;

/// Options for [`toc`] beyond the input file
pub struct TocArgs {
    pub write: bool,
    pub target: Option<PathBuf>,
    pub gate: Option<String>,
    pub max_level: Option<u8>,
}

#[derive(Serialize)]
struct DocumentSummary<'a> {
    headings: Vec<Heading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ladder: Option<&'a [LadderViolation]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unresolved: Option<&'a [UnresolvedEntry]>,
}

pub fn slug(output: &Output, text: &str, max_length: Option<usize>) -> Result<()> {
    let config = Config::load()?;
    let max_length = max_length.unwrap_or(config.project.anchors.max_length);
    let token = make_slug(text, max_length);

    if output.is_json() {
        output.data(&serde_json::json!({
            "text": text,
            "slug": token,
            "max_length": max_length,
        }));
    } else {
        println!("{}", token);
    }

    Ok(())
}

pub fn assign(
    output: &Output,
    file: &Path,
    prefix: Option<String>,
    write: bool,
    target: Option<&Path>,
) -> Result<()> {
    let config = Config::load()?;
    let mut options = config.assign_options();
    if prefix.is_some() {
        options.prefix = prefix;
    }
    output.verbose_ctx("assign", &format!("Options: {:?}", options));

    let document = parse_file(file)?;
    let assigned = assign_heading_ids_with(&document, &options);

    let summary = DocumentSummary {
        headings: assigned.heading_list(),
        ladder: None,
        unresolved: None,
    };
    emit(output, file, &assigned.render(), write, target, &summary)
}

pub fn toc(output: &Output, file: &Path, args: TocArgs) -> Result<()> {
    let config = Config::load()?;
    let mut options = config.pipeline_options();
    if let Some(gate) = &args.gate {
        options.gate = gate
            .parse::<GatePolicy>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(max_level) = args.max_level {
        options.toc.max_level = max_level;
    }
    output.verbose_ctx("toc", &format!("Options: {:?}", options));

    let html = read_input(file)?;
    let processed = process_html(&html, &options)
        .with_context(|| format!("Failed to build table of contents for {}", file.display()))?;

    output.verbose_ctx(
        "toc",
        &format!(
            "{} heading(s), {} ladder finding(s)",
            processed.document.heading_count(),
            processed.ladder.len()
        ),
    );

    let summary = DocumentSummary {
        headings: processed.document.heading_list(),
        ladder: Some(&processed.ladder),
        unresolved: Some(&processed.unresolved),
    };
    emit(
        output,
        file,
        &processed.document.render(),
        args.write,
        args.target.as_deref(),
        &summary,
    )
}

pub fn check(output: &Output, file: &Path) -> Result<()> {
    let document = parse_file(file)?;

    let toc_findings = resolve(&document);
    let link_findings = resolve_fragment_links(&document);
    let ladder = validate_heading_ladder(&document.heading_list());
    let has_toc = document.toc_block().is_some();

    if output.is_json() {
        output.data(&serde_json::json!({
            "file": file.display().to_string(),
            "has_toc": has_toc,
            "headings": document.heading_count(),
            "anchored": document.is_anchored(),
            "toc": toc_findings,
            "links": link_findings,
            "ladder": ladder,
        }));
    } else {
        println!("{}", file.display());
        println!(
            "  {} heading(s), {}",
            document.heading_count(),
            if has_toc { "table of contents present" } else { "no table of contents" }
        );
        if !document.is_anchored() {
            println!("  some headings have no anchor (run 'docanchor assign')");
        }
        for finding in &toc_findings {
            println!("  toc: {}", finding);
        }
        for finding in &link_findings {
            println!("  link: {}", finding);
        }
        for violation in &ladder {
            println!("  ladder: {}", violation.description);
        }
        if toc_findings.is_empty() && link_findings.is_empty() && ladder.is_empty() {
            println!("  ok");
        }
    }

    let unresolved = toc_findings.len() + link_findings.len();
    if unresolved > 0 {
        bail!("{} unresolved link(s) in {}", unresolved, file.display());
    }

    Ok(())
}

/// Reads a document from a file, or stdin for "-"
pub(super) fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut html = String::new();
        std::io::stdin()
            .read_to_string(&mut html)
            .context("Failed to read document from stdin")?;
        return Ok(html);
    }

    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

pub(super) fn parse_file(file: &Path) -> Result<Document> {
    let html = read_input(file)?;
    Document::parse(&html).with_context(|| format!("Malformed document: {}", file.display()))
}

fn emit<T: Serialize>(
    output: &Output,
    file: &Path,
    html: &str,
    write: bool,
    target: Option<&Path>,
    summary: &T,
) -> Result<()> {
    let destination = match (write, target) {
        (true, _) if file == Path::new("-") => bail!("Cannot use --write with stdin input"),
        (true, _) => Some(file),
        (false, Some(path)) => Some(path),
        (false, None) => None,
    };

    match destination {
        Some(path) => {
            fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
            output.success(&format!("Wrote {}", path.display()));
        }
        None => output.document(html, summary),
    }

    Ok(())
}
