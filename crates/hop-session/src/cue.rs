//! Recognised gateway prompts and the buffer they are matched against.

use hop_core::config::CuesConfig;

/// Upper bound on unmatched output kept for matching.
const MAX_BUFFER: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Cues
// ---------------------------------------------------------------------------

/// The kinds of prompt the driver reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    /// `ssh` asking whether to trust an unknown host key.
    HostKeyConfirm,
    /// The gateway asking for the operator's password.
    PasswordPrompt,
    /// The gateway asking for the one-time code.
    PinPrompt,
}

/// One literal prompt text and the kind it signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub kind: CueKind,
    pub pattern: Vec<u8>,
}

impl Cue {
    pub fn new(kind: CueKind, pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }
}

/// A cue found in the buffer, with the offset just past the matched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueMatch {
    pub kind: CueKind,
    pub end: usize,
}

/// Ordered list of cues. Earlier entries win when several match.
#[derive(Debug, Clone)]
pub struct CueTable {
    cues: Vec<Cue>,
}

impl CueTable {
    /// Host-key cues first, then password, then PIN.
    pub fn from_config(config: &CuesConfig) -> Self {
        let groups = [
            (CueKind::HostKeyConfirm, &config.host_key),
            (CueKind::PasswordPrompt, &config.password),
            (CueKind::PinPrompt, &config.pin),
        ];
        let cues = groups
            .into_iter()
            .flat_map(|(kind, patterns)| {
                patterns
                    .iter()
                    .map(move |p| Cue::new(kind, p.as_bytes().to_vec()))
            })
            .collect();
        Self { cues }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Test each cue against `haystack` in table order and return the first
    /// one that occurs anywhere in it.
    pub fn find(&self, haystack: &[u8]) -> Option<CueMatch> {
        self.cues.iter().find_map(|cue| {
            find_subslice(haystack, &cue.pattern).map(|pos| CueMatch {
                kind: cue.kind,
                end: pos + cue.pattern.len(),
            })
        })
    }

    fn longest_pattern(&self) -> usize {
        self.cues.iter().map(|c| c.pattern.len()).max().unwrap_or(0)
    }
}

impl Default for CueTable {
    fn default() -> Self {
        Self::from_config(&CuesConfig::default())
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ---------------------------------------------------------------------------
// MatchBuffer
// ---------------------------------------------------------------------------

/// Output received from the gateway but not yet consumed by a cue match.
#[derive(Debug, Default)]
pub struct MatchBuffer {
    bytes: Vec<u8>,
}

impl MatchBuffer {
    pub fn push(&mut self, chunk: &[u8], table: &CueTable) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > MAX_BUFFER {
            // Keep enough tail to complete a prompt split across reads.
            let keep = table.longest_pattern().max(1);
            let cut = self.bytes.len().saturating_sub(keep);
            self.bytes.drain(..cut);
        }
    }

    /// Find the highest-priority cue and consume the buffer through it.
    pub fn next_cue(&mut self, table: &CueTable) -> Option<CueKind> {
        let hit = table.find(&self.bytes)?;
        self.bytes.drain(..hit.end);
        Some(hit.kind)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whatever is left over, handed to the terminal uninspected.
    pub fn into_remaining(self) -> Vec<u8> {
        self.bytes
    }
}
