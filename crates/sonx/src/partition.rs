//! ✂️ Batch partitioning: how many workers, and who gets which records.
//!
//! Both functions are pure. No I/O, no runtime, no surprises.

/// 🎯 Clamp a requested worker count to `[1, batch_len]`.
///
/// Zero or negative asks become 1. Asking for more workers than records gets one
/// worker per record. An empty batch still answers 1; it just has nothing to split.
pub fn effective_parallelism(requested: i64, batch_len: usize) -> usize {
    let ceiling = batch_len.max(1);
    if requested <= 0 {
        return 1;
    }
    usize::try_from(requested).map_or(ceiling, |wanted| wanted.min(ceiling))
}

/// 📦 Split `items` into contiguous, non-empty groups of `ceil(len / parallelism)`.
///
/// Order is preserved inside and across groups, and every item lands in exactly one.
/// The last group takes whatever is left over, so there may be fewer groups than
/// `parallelism` (5 items over 4 workers is 2 + 2 + 1). An empty input yields no groups.
pub fn partition<T>(items: Vec<T>, parallelism: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let parallelism = parallelism.clamp(1, items.len());
    let chunk_size = items.len().div_ceil(parallelism);

    let mut groups = Vec::with_capacity(parallelism);
    let mut remaining = items;
    while !remaining.is_empty() {
        let tail = remaining.split_off(chunk_size.min(remaining.len()));
        groups.push(remaining);
        remaining = tail;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_nonsense_requests_become_one_worker() {
        assert_eq!(effective_parallelism(0, 10), 1);
        assert_eq!(effective_parallelism(-7, 10), 1);
        assert_eq!(effective_parallelism(i64::MIN, 10), 1);
    }

    #[test]
    fn the_one_where_workers_never_outnumber_records() {
        assert_eq!(effective_parallelism(50, 3), 3);
        assert_eq!(effective_parallelism(i64::MAX, 3), 3);
        assert_eq!(effective_parallelism(2, 3), 2);
        assert_eq!(effective_parallelism(4, 0), 1);
    }

    #[test]
    fn the_one_where_three_records_over_two_workers_split_two_and_one() {
        let groups = partition(vec!["A", "B", "C"], 2);
        assert_eq!(groups, vec![vec!["A", "B"], vec!["C"]]);
    }

    #[test]
    fn the_one_where_empty_batches_have_no_partitions() {
        assert!(partition(Vec::<u8>::new(), 4).is_empty());
    }

    #[test]
    fn the_one_where_the_last_group_takes_the_remainder() {
        let groups = partition((0..5).collect::<Vec<_>>(), 4);
        assert_eq!(groups, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn the_one_where_every_item_lands_exactly_once_in_order() {
        for len in 0..40usize {
            for requested in -2..45i64 {
                let items: Vec<usize> = (0..len).collect();
                let parallelism = effective_parallelism(requested, len);
                let groups = partition(items.clone(), parallelism);

                assert!(groups.len() <= parallelism);
                assert!(groups.iter().all(|g| !g.is_empty()));
                assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), len);
                assert_eq!(groups.concat(), items);
            }
        }
    }
}
