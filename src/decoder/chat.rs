//! Chat line speaker candidates
//!
//! A chat line is `<` + name + `> ` + text, but names may themselves contain
//! `> `, so the split point is ambiguous. The decoder records every possible
//! split; consumers pick the first candidate naming a known player.

use crate::event::Event;

const CLOSE: &str = "> ";

/// Every prefix of `body` that ends right before an occurrence of `"> "`,
/// shortest first. Empty prefixes are skipped.
pub fn speaker_candidates(body: &str) -> Vec<String> {
    body.match_indices(CLOSE)
        .filter(|(idx, _)| *idx > 0)
        .map(|(idx, _)| body[..idx].to_string())
        .collect()
}

/// A chat message attributed to a known speaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChat<'a> {
    pub speaker: &'a str,
    pub text: &'a str,
}

/// Resolve the speaker of a chat event: the first candidate, in order,
/// accepted by `is_known`.
pub fn resolve_speaker<'a, F>(event: &'a Event, is_known: F) -> Option<ResolvedChat<'a>>
where
    F: Fn(&str) -> bool,
{
    let body = event.field("text")?;
    event
        .candidates
        .iter()
        .find(|candidate| is_known(candidate))
        .and_then(|speaker| {
            let text = body.get(speaker.len() + CLOSE.len()..)?;
            Some(ResolvedChat {
                speaker: speaker.as_str(),
                text,
            })
        })
}
