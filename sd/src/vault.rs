//! Vault I/O
//!
//! Reads candidate pages from a directory of markdown files and writes an
//! approved plan back. The planning engine itself never touches the disk.

use std::fs;
use std::path::{Component, Path, PathBuf};

use eyre::{Context, Result, bail};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::delta::{ExistingPage, PageAction, StoryDeltaPlan};

/// Counts of pages written by [`apply_plan`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
}

/// Load every `.md` file under `vault` as an existing page
///
/// Hidden files and directories are skipped. Paths are vault-relative with
/// `/` separators, and the result is sorted by path.
pub fn load_existing_pages(vault: &Path) -> Result<Vec<ExistingPage>> {
    debug!(?vault, "load_existing_pages: called");
    if !vault.is_dir() {
        bail!("Vault directory not found: {}", vault.display());
    }

    let mut pages = Vec::new();
    let walker = WalkDir::new(vault)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md")));

    for entry in walker {
        let Some(relative) = relative_page_path(vault, entry.path()) else {
            continue;
        };
        match fs::read_to_string(entry.path()) {
            Ok(content) => pages.push(ExistingPage::new(relative, content)),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Skipping unreadable page"),
        }
    }

    pages.sort_by(|a, b| a.path.cmp(&b.path));
    info!(page_count = pages.len(), vault = %vault.display(), "Loaded existing pages");
    Ok(pages)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn relative_page_path(vault: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(vault).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Join a vault-relative page path onto `vault`, refusing escapes
pub fn resolve_page_path(vault: &Path, relative: &str) -> Result<PathBuf> {
    let relative_path = Path::new(relative);
    let escapes = relative_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.trim().is_empty() || escapes {
        bail!("Refusing page path outside the vault: {}", relative);
    }
    Ok(vault.join(relative_path))
}

/// Write every planned page into `vault`
///
/// All pages are checked before anything is written: a page created by
/// the plan must not exist yet, and a page updated by the plan must still
/// hold the content the plan was computed from.
pub fn apply_plan(vault: &Path, plan: &StoryDeltaPlan) -> Result<ApplySummary> {
    debug!(?vault, page_count = plan.pages.len(), "apply_plan: called");

    let mut targets = Vec::with_capacity(plan.pages.len());
    for page in &plan.pages {
        let target = resolve_page_path(vault, &page.path)?;
        match page.action {
            PageAction::Create => {
                if target.exists() {
                    bail!("Page {} already exists; re-run the plan", page.path);
                }
            }
            PageAction::Update => {
                let current = fs::read_to_string(&target)
                    .context(format!("Failed to read page {} before update", page.path))?;
                if page.previous_content.as_deref() != Some(current.as_str()) {
                    bail!("Page {} changed since the plan was made; re-run the plan", page.path);
                }
            }
        }
        targets.push(target);
    }

    let mut summary = ApplySummary::default();
    for (page, target) in plan.pages.iter().zip(targets) {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).context(format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&target, &page.content).context(format!("Failed to write page {}", page.path))?;
        match page.action {
            PageAction::Create => summary.created += 1,
            PageAction::Update => summary.updated += 1,
        }
        info!(path = %page.path, action = %page.action, "Wrote page");
    }
    Ok(summary)
}
