//! Handler registry with half-open API-version ranges per `handler_id`
//! (spec.md §4.6).

use std::collections::HashMap;

use crate::handler::HandlerFn;

struct VersionEntry {
    base: u32,
    end: Option<u32>,
    handler: HandlerFn,
}

/// One `handler_id`'s ordered list of version ranges.
#[derive(Default)]
struct Registrations {
    entries: Vec<VersionEntry>,
}

impl Registrations {
    fn push_sorted(&mut self, base: u32, end: Option<u32>, handler: HandlerFn) {
        let pos = self.entries.partition_point(|e| e.base < base);
        self.entries.insert(pos, VersionEntry { base, end, handler });
    }

    /// Resolves each entry's effective end per the registration rules:
    /// explicit `end_version` wins; otherwise a later base implies
    /// `[base, next_base - 1]`; the last entry is open-ended.
    fn resolved_end(&self, index: usize) -> Option<u32> {
        if let Some(end) = self.entries[index].end {
            return Some(end);
        }
        self.entries.get(index + 1).map(|next| next.base - 1)
    }

    fn lookup(&self, api_version: u32) -> Option<&HandlerFn> {
        for (i, entry) in self.entries.iter().enumerate() {
            if api_version < entry.base {
                continue;
            }
            match self.resolved_end(i) {
                Some(end) if api_version <= end => return Some(&entry.handler),
                None => return Some(&entry.handler),
                _ => continue,
            }
        }
        None
    }
}

/// Maps `handler_id -> api_version -> handler`, with explicit-404 gaps
/// between a prior entry's end and the next base.
#[derive(Default)]
pub struct Router {
    by_handler_id: HashMap<u16, Registrations>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `handler_id` starting at `base_version`,
    /// optionally bounded by `end_version` (inclusive).
    pub fn register(
        &mut self,
        handler_id: u16,
        base_version: u32,
        end_version: Option<u32>,
        handler: HandlerFn,
    ) {
        self.by_handler_id
            .entry(handler_id)
            .or_default()
            .push_sorted(base_version, end_version, handler);
    }

    pub fn lookup(&self, handler_id: u16, api_version: u32) -> Option<&HandlerFn> {
        self.by_handler_id
            .get(&handler_id)
            .and_then(|reg| reg.lookup(api_version))
    }
}
