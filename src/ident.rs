// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashSet;

/// Encode a 0-based ordinal in bijective base-26 capital letters:
/// 0 is "A", 25 is "Z", 26 is "AA", 51 is "AZ", 52 is "BA".
fn alpha_id(n: u64) -> String {
    let mut n = n;
    let mut id = String::new();
    loop {
        id.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    id
}

/// Returns the first node id not present in `existing`, enumerating
/// candidates in generation order (A..Z, AA..AZ, BA..).
///
/// Deleted ids are reused: with {A, C} in use the next id is "B", not "D".
pub fn next_node_id(existing: &HashSet<String>) -> String {
    let mut n = 0u64;
    loop {
        let candidate = alpha_id(n);
        if !existing.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Returns the smallest unused positive integer edge id, stringified.
pub fn next_edge_id(existing: &HashSet<u64>) -> String {
    let mut i = 1u64;
    while existing.contains(&i) {
        i += 1;
    }
    i.to_string()
}

/// Claim-style edge id allocator for batch operations that create many
/// edges against one working set (delete-rewire cross products, save-path
/// id backfill). Every claimed id joins the used set, so ids never collide
/// within a batch.
pub struct EdgeIdAllocator {
    used: HashSet<u64>,
    next: u64,
}

impl EdgeIdAllocator {
    pub fn new(used: HashSet<u64>) -> Self {
        EdgeIdAllocator { used, next: 1 }
    }

    /// Seeds the used set from edge id strings, ignoring non-numeric ids
    /// (they cannot collide with freshly allocated numeric ids).
    pub fn seeded<'a>(ids: impl Iterator<Item = &'a str>) -> Self {
        EdgeIdAllocator::new(ids.filter_map(|id| id.parse::<u64>().ok()).collect())
    }

    pub fn claim(&mut self) -> u64 {
        while self.used.contains(&self.next) {
            self.next += 1;
        }
        self.used.insert(self.next);
        self.next
    }
}
