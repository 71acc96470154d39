//! Line breakpoint registry.
//!
//! Breakpoints are keyed by normalized source path and 1-based line. Ids are
//! assigned from 1 and never reused. Re-submitting an existing location hands
//! back the existing id with `verified = false`, which is how the paired
//! editor extension distinguishes a duplicate request from a new placement.
//! The registry is append-only; editors that want a clean slate restart the
//! session.

/// A placed (or re-requested) breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: i64,
    /// Normalized absolute path, see [`normalize`].
    pub source_path: String,
    /// 1-based line.
    pub line: i64,
    pub verified: bool,
}

/// Normalize a source path the way the editor side expects: a leading drive
/// letter is upper-cased and forward slashes become backslashes. The rest of
/// the path keeps its case and is compared byte-exact. Idempotent.
pub fn normalize(path: &str) -> String {
    let mut out = path.replace('/', "\\");
    let bytes = out.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_lowercase() {
        let drive = bytes[0].to_ascii_uppercase() as char;
        out.replace_range(0..1, &drive.to_string());
    }
    out
}

/// The session's breakpoint store.
#[derive(Debug, Default)]
pub struct BreakpointTable {
    entries: Vec<Breakpoint>,
    next_id: i64,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Place a breakpoint, or re-acknowledge an existing one. A new location
    /// gets the next id and `verified = true`; a duplicate returns the stored
    /// id with `verified = false`.
    pub fn add(&mut self, source: &str, line: i64) -> Breakpoint {
        let source_path = normalize(source);
        if let Some(existing) = self
            .entries
            .iter()
            .find(|bp| bp.source_path == source_path && bp.line == line)
        {
            return Breakpoint {
                id: existing.id,
                source_path,
                line,
                verified: false,
            };
        }
        let placed = Breakpoint {
            id: self.next_id,
            source_path,
            line,
            verified: true,
        };
        self.next_id += 1;
        self.entries.push(placed.clone());
        placed
    }

    /// Look up the breakpoint at a location, normalizing the query path.
    pub fn find(&self, source: &str, line: i64) -> Option<&Breakpoint> {
        let source_path = normalize(source);
        self.entries
            .iter()
            .find(|bp| bp.source_path == source_path && bp.line == line)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
