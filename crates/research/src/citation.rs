//! Inline citation markers.
//!
//! Two kinds of marker appear in model output: local hit numbers inside a
//! grounded summary (`[2]`, `[1, 3]`) and registry ids everywhere else
//! (`[S4]`, `[S1, S4]`). A bracket group is a marker only when every
//! comma-separated item in it is one of those forms.

use deepsift_core::SourceId;
use std::collections::HashSet;

/// One item inside a marker group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CitationRef {
    /// 1-based position in a numbered hit list
    Local(usize),
    Source(SourceId),
}

const MAX_GROUP_LEN: usize = 64;

fn parse_item(item: &str) -> Option<CitationRef> {
    let item = item.trim();
    if item.starts_with(['S', 's']) {
        return SourceId::parse(item).map(CitationRef::Source);
    }
    if item.is_empty() || !item.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match item.parse::<usize>() {
        Ok(n) if n > 0 => Some(CitationRef::Local(n)),
        _ => None,
    }
}

fn parse_group(inner: &str) -> Option<Vec<CitationRef>> {
    if inner.len() > MAX_GROUP_LEN || inner.contains(['[', '\n']) {
        return None;
    }
    inner.split(',').map(parse_item).collect()
}

fn render_group(refs: &[CitationRef]) -> String {
    let items: Vec<String> = refs
        .iter()
        .map(|r| match r {
            CitationRef::Local(n) => n.to_string(),
            CitationRef::Source(id) => id.to_string(),
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Rewrite every marker group through `f`.
///
/// `f` returns the refs to keep; a group left empty is removed together with
/// one preceding space.
pub fn map_markers<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&[CitationRef]) -> Vec<CitationRef>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let (before, from_open) = rest.split_at(open);
        out.push_str(before);

        let Some(close) = from_open.find(']') else {
            out.push_str(from_open);
            return out;
        };
        let inner = &from_open[1..close];
        let after = &from_open[close + 1..];

        match parse_group(inner) {
            // `[text](url)` style links are not markers even if numeric
            Some(refs) if !after.starts_with('(') => {
                let kept = f(&refs);
                if kept.is_empty() {
                    if out.ends_with(' ') {
                        out.pop();
                    }
                } else {
                    out.push_str(&render_group(&kept));
                }
                rest = after;
            }
            _ => {
                out.push('[');
                rest = &from_open[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// All refs in order of first appearance, without repeats.
pub fn collect_refs(text: &str) -> Vec<CitationRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    map_markers(text, |group| {
        for r in group {
            if seen.insert(*r) {
                refs.push(*r);
            }
        }
        group.to_vec()
    });
    refs
}

/// Local hit numbers cited in a summary, in order of first appearance.
pub fn local_refs(text: &str) -> Vec<usize> {
    collect_refs(text)
        .into_iter()
        .filter_map(|r| match r {
            CitationRef::Local(n) => Some(n),
            CitationRef::Source(_) => None,
        })
        .collect()
}

/// Registry ids cited in a text, in order of first appearance.
pub fn source_refs(text: &str) -> Vec<SourceId> {
    collect_refs(text)
        .into_iter()
        .filter_map(|r| match r {
            CitationRef::Source(id) => Some(id),
            CitationRef::Local(_) => None,
        })
        .collect()
}

/// Replace local hit numbers with registry ids.
///
/// Numbers without a mapping are dropped.
pub fn rewrite_local<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(usize) -> Option<SourceId>,
{
    map_markers(text, |group| {
        let mut kept: Vec<CitationRef> = Vec::new();
        for r in group {
            let mapped = match *r {
                CitationRef::Local(n) => lookup(n).map(CitationRef::Source),
                source => Some(source),
            };
            if let Some(m) = mapped
                && !kept.contains(&m)
            {
                kept.push(m);
            }
        }
        kept
    })
}

/// Keep only registry ids accepted by `is_known`; every other ref is removed.
///
/// Returns the cleaned text and the refs that were dropped.
pub fn retain_known<F>(text: &str, is_known: F) -> (String, Vec<CitationRef>)
where
    F: Fn(SourceId) -> bool,
{
    let mut dropped = Vec::new();
    let cleaned = map_markers(text, |group| {
        group
            .iter()
            .copied()
            .filter(|r| match r {
                CitationRef::Source(id) if is_known(*id) => true,
                other => {
                    dropped.push(*other);
                    false
                }
            })
            .collect()
    });
    (cleaned, dropped)
}
