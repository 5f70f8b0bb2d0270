//! The run table: the ordered, non-overlapping translation runs that make
//! up the flat physical view.
//!
//! Lookup is a predecessor query on a `BTreeMap` keyed by run start.
//! `find_le` deliberately returns the raw predecessor without checking
//! coverage; callers that need containment apply the bounds check (or use
//! [`RunTable::containing`]), so "nearest run below" and "run covering
//! this address" stay distinct operations.

use crate::stream::StreamHandle;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

/// One contiguous translation run: addresses `[start, start + length)`
/// read from `stream` starting at `file_offset`.
#[derive(Clone)]
pub struct Run {
    pub start: u64,
    pub file_offset: u64,
    pub length: u64,
    pub stream: StreamHandle,
}

impl Run {
    pub fn new(start: u64, file_offset: u64, length: u64, stream: StreamHandle) -> Run {
        Run {
            start,
            file_offset,
            length,
            stream,
        }
    }

    /// One past the last address this run covers.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Whether `address` falls inside this run.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end()
    }

    /// The backing-stream offset for `address`, which must lie inside the
    /// run.
    pub fn translate(&self, address: u64) -> u64 {
        self.file_offset + (address - self.start)
    }
}

impl fmt::Debug for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("start", &format_args!("{:#x}", self.start))
            .field("file_offset", &format_args!("{:#x}", self.file_offset))
            .field("length", &format_args!("{:#x}", self.length))
            .field("stream", &self.stream.urn())
            .finish()
    }
}

/// Ordered, non-overlapping runs keyed by start address.
#[derive(Debug, Default)]
pub struct RunTable {
    runs: BTreeMap<u64, Run>,
}

impl RunTable {
    pub fn new() -> RunTable {
        RunTable::default()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Runs in ascending start order.
    pub fn iter(&self) -> impl Iterator<Item = &Run> {
        self.runs.values()
    }

    /// One past the highest covered address; 0 for an empty table.
    pub fn end(&self) -> u64 {
        self.runs.values().next_back().map_or(0, Run::end)
    }

    /// The run with the greatest start at or below `address`, regardless
    /// of whether it reaches `address`.
    pub fn find_le(&self, address: u64) -> Option<&Run> {
        self.runs.range(..=address).next_back().map(|(_, run)| run)
    }

    /// The run covering `address`, if any.
    pub fn containing(&self, address: u64) -> Option<&Run> {
        self.find_le(address).filter(|run| run.contains(address))
    }

    /// The first run starting strictly above `address`, if any. Sizes the
    /// zero-fill for unmapped gaps.
    pub fn next_after(&self, address: u64) -> Option<&Run> {
        self.runs
            .range((Excluded(address), Unbounded))
            .next()
            .map(|(_, run)| run)
    }

    /// Insert a run. Overlapped portions of older runs are replaced; their
    /// non-overlapped portions remain addressable. Adjacent runs over the
    /// same stream with contiguous backing offsets coalesce.
    pub fn insert(&mut self, run: Run) {
        if run.length == 0 {
            return;
        }
        let start = run.start;

        // An older run straddling the new start keeps its part below the
        // new run and, if it extends past the new end, its part above.
        if let Some(prev_key) = self.runs.range(..start).next_back().map(|(k, _)| *k) {
            let overlaps = self.runs[&prev_key].end() > start;
            if overlaps {
                if let Some(prev) = self.runs.remove(&prev_key) {
                    let mut head = prev.clone();
                    head.length = start - prev.start;
                    self.runs.insert(head.start, head);
                    if prev.end() > run.end() {
                        let tail = Run::new(
                            run.end(),
                            prev.translate(run.end()),
                            prev.end() - run.end(),
                            prev.stream,
                        );
                        self.runs.insert(tail.start, tail);
                    }
                }
            }
        }

        // Older runs starting inside the new run are swallowed, keeping a
        // trimmed tail where one extends past the new end.
        let covered: Vec<u64> = self
            .runs
            .range(start..run.end())
            .map(|(k, _)| *k)
            .collect();
        for key in covered {
            if let Some(old) = self.runs.remove(&key) {
                if old.end() > run.end() {
                    let tail = Run::new(
                        run.end(),
                        old.translate(run.end()),
                        old.end() - run.end(),
                        old.stream,
                    );
                    self.runs.insert(tail.start, tail);
                }
            }
        }

        self.runs.insert(start, run);
        self.coalesce(start);
    }

    /// Merge the run at `start` with its neighbours where ranges continue
    /// seamlessly.
    fn coalesce(&mut self, start: u64) {
        if let Some(next_key) = self
            .runs
            .range((Excluded(start), Unbounded))
            .next()
            .map(|(k, _)| *k)
        {
            self.try_merge(start, next_key);
        }
        if let Some(prev_key) = self.runs.range(..start).next_back().map(|(k, _)| *k) {
            self.try_merge(prev_key, start);
        }
    }

    /// Merge `right` into `left` when they are adjacent in both address
    /// and backing space and share a stream.
    fn try_merge(&mut self, left_key: u64, right_key: u64) {
        let mergeable = match (self.runs.get(&left_key), self.runs.get(&right_key)) {
            (Some(l), Some(r)) => {
                l.end() == r.start
                    && l.file_offset + l.length == r.file_offset
                    && Arc::ptr_eq(&l.stream, &r.stream)
            }
            _ => false,
        };
        if !mergeable {
            return;
        }
        if let Some(right) = self.runs.remove(&right_key) {
            if let Some(left) = self.runs.get_mut(&left_key) {
                left.length += right.length;
            }
        }
    }
}
