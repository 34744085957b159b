//! Tiered-layering merge planner (C4).
//!
//! Groups the mergeable segment files of a single collection+partition into
//! merge jobs. A pure function over an owned [`FilesHolder`] plus an injected
//! `now_micros` clock reading, so planning is deterministic and testable
//! without a wall clock dependency — mirroring the scheduler's own
//! clock-injection style.

use segmentdb_domain::{FilesHolder, SegmentFileId, SegmentSchema};

/// Age, in microseconds, after which a file left alone in its layer is
/// lifted into the force-merge carry rather than left waiting for a peer.
pub const FORCE_MERGE_THRESHOLD_MICROS: u64 = 300 * 1_000_000;

/// Layer ceilings in bytes: 4 MiB, 16 MiB, 64 MiB, 256 MiB, 1 GiB, 4 GiB,
/// 16 GiB, 64 GiB.
const LAYER_CEILINGS: [u64; 8] = [1 << 22, 1 << 24, 1 << 26, 1 << 28, 1 << 30, 1 << 32, 1 << 34, 1 << 36];

/// One emitted merge job: two or more files the caller should combine into a
/// single output segment.
pub type MergeGroup = Vec<SegmentSchema>;

/// Plans merges for every file currently in `holder`, using the default
/// force-merge age threshold. Files that end up in a group, or that are
/// excluded from this round, are removed from `holder` via `unmark_file`.
pub fn plan_merges(holder: &mut FilesHolder, now_micros: u64) -> Vec<MergeGroup> {
    plan_merges_with_threshold(holder, now_micros, FORCE_MERGE_THRESHOLD_MICROS)
}

/// Plans merges with an explicit force-merge age threshold, for tests that
/// need to exercise aging without depending on `FORCE_MERGE_THRESHOLD_MICROS`
/// and a real clock.
pub fn plan_merges_with_threshold(holder: &mut FilesHolder, now_micros: u64, force_merge_threshold_micros: u64) -> Vec<MergeGroup> {
    if holder.len() < 2 {
        return Vec::new();
    }

    let mut by_size_desc = holder.as_slice().to_vec();
    by_size_desc.sort_by(|a, b| b.file_size.cmp(&a.file_size));

    let target = by_size_desc[0].index_file_size_target;
    let big = by_size_desc[0].file_size;

    let mut groups: Vec<MergeGroup> = Vec::new();
    let mut unmarked_ids: Vec<SegmentFileId> = Vec::new();

    // Step 3 — priority pairing: scan from the smallest file upward, ending
    // before the second-largest. Preserved verbatim, including the off-by-one
    // that makes this a no-op once only two files remain.
    if by_size_desc.len() > 2 {
        let pair_index = (2..by_size_desc.len()).rev().find(|&i| by_size_desc[i].file_size + big > target);

        if let Some(i) = pair_index {
            let small = by_size_desc.remove(i);
            let big_file = by_size_desc.remove(0);
            groups.push(vec![big_file, small]);
        }
    }

    // Step 4 — layer the remaining files, smallest first.
    let mut layers: Vec<Vec<SegmentSchema>> = (0..LAYER_CEILINGS.len()).map(|_| Vec::new()).collect();
    let mut huge_files: Vec<SegmentSchema> = Vec::new();

    for file in by_size_desc.into_iter().rev() {
        if file.file_size > file.index_file_size_target {
            unmarked_ids.push(file.file_id.clone());
            continue;
        }

        match LAYER_CEILINGS.iter().position(|&ceiling| file.file_size < ceiling) {
            Some(layer_index) => layers[layer_index].push(file),
            None => huge_files.push(file),
        }
    }

    // Step 5 — ascending pass carrying a force-merge carry between layers.
    let mut carry: Vec<SegmentSchema> = Vec::new();
    for layer in &mut layers {
        if layer.is_empty() {
            continue;
        }
        layer.append(&mut carry);

        if layer.len() == 1 {
            let age = now_micros.saturating_sub(layer[0].created_on);
            if age > force_merge_threshold_micros {
                if let Some(lone_file) = layer.pop() {
                    carry.push(lone_file);
                }
            }
        }
    }

    // Step 6 — a surviving carry folds into huge_files, if any exist there.
    if !carry.is_empty() && !huge_files.is_empty() {
        huge_files.append(&mut carry);
    }

    // Step 7 — emit layers, then huge_files, then unmark any stray carry.
    for layer in layers {
        match layer.len() {
            0 => {},
            1 => unmarked_ids.push(layer[0].file_id.clone()),
            _ => groups.push(layer),
        }
    }

    if !huge_files.is_empty() {
        if huge_files.len() >= 2 {
            groups.push(huge_files);
        } else {
            unmarked_ids.extend(huge_files.into_iter().map(|file| file.file_id));
        }
    }

    unmarked_ids.extend(carry.into_iter().map(|file| file.file_id));

    for group in &groups {
        for file in group {
            holder.unmark_file(&file.file_id);
        }
    }
    for file_id in &unmarked_ids {
        holder.unmark_file(file_id);
    }

    tracing::debug!(groups = groups.len(), unmarked = unmarked_ids.len(), "merge plan computed");
    groups
}
