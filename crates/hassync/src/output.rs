//! Line-oriented output helpers.
//!
//! Status lines are colored by severity when stdout is a terminal; the
//! grouped entity listing is plain text, one entity per line.

use std::io::{IsTerminal, stdout};

use owo_colors::OwoColorize;

use hassync_core::{DomainView, SyncStatus};

/// Color only when interactive and NO_COLOR is unset.
pub fn should_color() -> bool {
    stdout().is_terminal() && std::env::var("NO_COLOR").is_err()
}

/// One status transition, colored by severity.
pub fn status_line(status: &SyncStatus, color: bool) -> String {
    if !color {
        return status.message.clone();
    }

    if status.is_error {
        status.message.red().to_string()
    } else {
        status.message.green().to_string()
    }
}

/// Compact per-domain summary, e.g. `42 entities (light: 12, switch: 8, ...)`.
pub fn domain_summary(view: &DomainView) -> String {
    let total: usize = view.values().map(std::collections::BTreeMap::len).sum();
    let per_domain = view
        .iter()
        .map(|(domain, bucket)| format!("{domain}: {}", bucket.len()))
        .collect::<Vec<_>>()
        .join(", ");

    if per_domain.is_empty() {
        format!("{total} entities")
    } else {
        format!("{total} entities ({per_domain})")
    }
}

/// Full grouped listing, optionally restricted to one domain.
pub fn render_states(view: &DomainView, domain: Option<&str>, color: bool) -> String {
    let mut out = String::new();

    for (name, bucket) in view {
        if domain.is_some_and(|d| d != name) {
            continue;
        }

        if color {
            out.push_str(&format!("{}\n", name.bold()));
        } else {
            out.push_str(&format!("{name}\n"));
        }

        for (id, entity) in bucket {
            let label = entity
                .friendly_name()
                .map_or_else(String::new, |n| format!("  ({n})"));
            out.push_str(&format!("  {id}: {}{label}\n", entity.state));
        }
    }

    if out.is_empty() {
        match domain {
            Some(d) => format!("no entities in domain '{d}'\n"),
            None => "no entities\n".to_owned(),
        }
    } else {
        out
    }
}

// ── Tests ────────────────────────────────────────────────────────────
