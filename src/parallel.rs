//! Order-preserving parallel map over contiguous chunks.
//!
//! Items `0..n_items` are split into at most `n_workers` contiguous chunks.
//! Each chunk is processed on a dedicated rayon pool and tagged with its
//! index, so the concatenated output always follows input order regardless
//! of completion order. After the first failure no new chunk is started;
//! the failure with the lowest chunk index is returned.

use crate::error::{DeconvError, Result};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

/// Split `0..n_items` into `n_chunks` contiguous ranges whose lengths differ
/// by at most one, longer chunks first.
pub fn chunk_ranges(n_items: usize, n_chunks: usize) -> Vec<Range<usize>> {
    let n_chunks = n_chunks.max(1).min(n_items.max(1));
    let base = n_items / n_chunks;
    let extra = n_items % n_chunks;

    let mut ranges = Vec::with_capacity(n_chunks);
    let mut start = 0;
    for i in 0..n_chunks {
        let len = base + usize::from(i < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Apply `f` to each chunk of `0..n_items` and concatenate the outputs.
pub fn map_chunks<T, F>(n_items: usize, n_workers: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(Range<usize>) -> Result<Vec<T>> + Sync,
{
    if n_workers == 0 {
        return Err(DeconvError::configuration("parallel", "worker count must be at least 1"));
    }
    if n_items == 0 {
        return Ok(Vec::new());
    }

    let ranges = chunk_ranges(n_items, n_workers);
    let cancelled = AtomicBool::new(false);

    let run_chunk = |(idx, range): (usize, Range<usize>)| -> (usize, Option<Result<Vec<T>>>) {
        if cancelled.load(Ordering::Relaxed) {
            return (idx, None);
        }
        let out = f(range);
        if out.is_err() {
            cancelled.store(true, Ordering::Relaxed);
        }
        (idx, Some(out))
    };

    let mut tagged: Vec<(usize, Option<Result<Vec<T>>>)> = if ranges.len() == 1 {
        ranges.into_iter().enumerate().map(run_chunk).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ranges.len())
            .build()
            .map_err(|e| DeconvError::ParallelWorker {
                chunk: 0,
                source: Box::new(DeconvError::configuration(
                    "parallel",
                    format!("failed to build thread pool: {}", e),
                )),
            })?;
        pool.install(|| ranges.into_par_iter().enumerate().map(run_chunk).collect())
    };

    tagged.sort_by_key(|(idx, _)| *idx);

    let mut first_error = None;
    let mut chunks = Vec::with_capacity(tagged.len());
    for (idx, out) in tagged {
        match out {
            Some(Ok(values)) => chunks.push(values),
            Some(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some((idx, e));
                }
            }
            None => {}
        }
    }
    if let Some((chunk, source)) = first_error {
        return Err(DeconvError::ParallelWorker {
            chunk,
            source: Box::new(source),
        });
    }

    Ok(chunks.into_iter().flatten().collect())
}
