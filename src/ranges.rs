//! Compact range notation for rank sets, e.g. `0-2,5,7-8,10`.

use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("invalid rank `{0}`")]
    InvalidRank(String),
    #[error("descending range `{0}`")]
    Descending(String),
    #[error("`{entry}` is outside a group of {size} ranks")]
    OutOfGroup { entry: String, size: usize },
}

/// Inclusive `(first, last)` runs, ascending, non-overlapping, non-adjacent.
type Runs = Vec<(usize, usize)>;

fn render(runs: &[(usize, usize)]) -> String {
    runs.iter()
        .map(|&(first, last)| {
            if first == last {
                first.to_string()
            } else {
                format!("{first}-{last}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders `ranks` with maximal consecutive runs collapsed to `first-last`.
pub fn format_ranges(ranks: &BTreeSet<usize>) -> String {
    let mut runs: Runs = Vec::new();
    let mut iter = ranks.iter().copied().peekable();

    while let Some(first) = iter.next() {
        let mut last = first;
        while let Some(next) = iter.next_if(|&n| Some(n) == last.checked_add(1)) {
            last = next;
        }
        runs.push((first, last));
    }

    render(&runs)
}

/// Parses every entry into an inclusive span without expanding it. Entries
/// keep their input order and text.
fn entries(input: &str) -> Result<Vec<(&str, usize, usize)>, RangeParseError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| match part.split_once('-') {
            Some((lo, hi)) => {
                let lo = parse_rank(lo)?;
                let hi = parse_rank(hi)?;
                if lo > hi {
                    return Err(RangeParseError::Descending(part.to_owned()));
                }
                Ok((part, lo, hi))
            }
            None => {
                let rank = parse_rank(part)?;
                Ok((part, rank, rank))
            }
        })
        .collect()
}

/// Expands range notation into the set of ranks of a group of `size`.
/// Whitespace around entries is ignored, overlapping entries merge, and an
/// empty string is the empty set. Entries reaching past the group are
/// rejected before anything is expanded.
pub fn parse_ranges(input: &str, size: usize) -> Result<BTreeSet<usize>, RangeParseError> {
    let entries = entries(input)?;
    if let Some(&(entry, _, _)) = entries.iter().find(|&&(_, _, hi)| hi >= size) {
        return Err(RangeParseError::OutOfGroup {
            entry: entry.to_owned(),
            size,
        });
    }

    Ok(entries
        .into_iter()
        .flat_map(|(_, lo, hi)| lo..=hi)
        .collect())
}

/// Rewrites range notation in canonical form, merging overlapping and
/// adjacent entries. Works on spans, so the size of a range is irrelevant.
pub fn normalize_ranges(input: &str) -> Result<String, RangeParseError> {
    let mut spans: Runs = entries(input)?
        .into_iter()
        .map(|(_, lo, hi)| (lo, hi))
        .collect();
    spans.sort_unstable();

    let mut runs: Runs = Vec::with_capacity(spans.len());
    for (lo, hi) in spans {
        match runs.last_mut() {
            Some((_, last)) if last.checked_add(1).is_none_or(|next| lo <= next) => {
                *last = (*last).max(hi);
            }
            _ => runs.push((lo, hi)),
        }
    }

    Ok(render(&runs))
}

fn parse_rank(s: &str) -> Result<usize, RangeParseError> {
    s.trim()
        .parse()
        .map_err(|_| RangeParseError::InvalidRank(s.trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], "")]
    #[case(&[5], "5")]
    #[case(&[0, 1, 2, 3], "0-3")]
    #[case(&[0, 1, 2, 5, 7, 8, 10], "0-2,5,7-8,10")]
    #[case(&[1, 3, 5], "1,3,5")]
    #[case(&[4, 5], "4-5")]
    #[case(&[usize::MAX - 1, usize::MAX], "18446744073709551614-18446744073709551615")]
    #[case(&[0, usize::MAX], "0,18446744073709551615")]
    fn formats_known_sets(#[case] ranks: &[usize], #[case] expected: &str) {
        let set: BTreeSet<usize> = ranks.iter().copied().collect();
        assert_eq!(format_ranges(&set), expected);
    }

    #[rstest]
    #[case("", &[])]
    #[case("0-2, 5 ,7-8,10", &[0, 1, 2, 5, 7, 8, 10])]
    #[case("3,1-2,2", &[1, 2, 3])]
    fn parses_range_lists(#[case] input: &str, #[case] expected: &[usize]) {
        let expected: BTreeSet<usize> = expected.iter().copied().collect();
        assert_eq!(parse_ranges(input, 16).unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(
            parse_ranges("1,x", 4),
            Err(RangeParseError::InvalidRank("x".to_owned()))
        );
        assert_eq!(
            parse_ranges("5-2", 8),
            Err(RangeParseError::Descending("5-2".to_owned()))
        );
        assert!(parse_ranges("-3", 4).is_err());
    }

    #[rstest]
    #[case("4")]
    #[case("0-1,2")]
    #[case("0-100000000000")]
    #[case("18446744073709551615")]
    fn rejects_ranks_past_the_group(#[case] input: &str) {
        let err = parse_ranges(input, 2).unwrap_err();
        assert!(matches!(err, RangeParseError::OutOfGroup { size: 2, .. }), "{err}");
    }

    #[rstest]
    #[case("7,0-2,5,8,10", "0-2,5,7-8,10")]
    #[case("3-5,0-4", "0-5")]
    #[case("6,5,4", "4-6")]
    #[case("0-100000000000,100000000001", "0-100000000001")]
    #[case(
        "18446744073709551615,18446744073709551614",
        "18446744073709551614-18446744073709551615"
    )]
    #[case("0-18446744073709551615,7", "0-18446744073709551615")]
    #[case(" ", "")]
    fn normalizes_without_expanding(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_ranges(input).unwrap(), expected);
    }

    fn small_sets() -> impl Strategy<Value = BTreeSet<usize>> {
        prop::collection::btree_set(0usize..50, 0..30)
    }

    proptest! {
        #[test]
        fn format_then_expand_is_identity(set in prop::collection::btree_set(0usize..200, 0..64)) {
            let rendered = format_ranges(&set);
            prop_assert_eq!(parse_ranges(&rendered, 200).unwrap(), set);
        }

        #[test]
        fn normalizing_agrees_with_formatting(set in small_sets()) {
            let listed: Vec<String> = set.iter().rev().map(ToString::to_string).collect();
            prop_assert_eq!(normalize_ranges(&listed.join(",")).unwrap(), format_ranges(&set));
        }

        #[test]
        fn output_has_no_adjacent_singletons(set in small_sets()) {
            let rendered = format_ranges(&set);
            let starts: Vec<usize> = rendered
                .split(',')
                .filter(|p| !p.is_empty())
                .map(|p| p.split('-').next().unwrap().parse().unwrap())
                .collect();
            let ends: Vec<usize> = rendered
                .split(',')
                .filter(|p| !p.is_empty())
                .map(|p| p.rsplit('-').next().unwrap().parse().unwrap())
                .collect();
            // Runs are maximal: no run ends right before the next begins.
            for (end, next) in ends.iter().zip(starts.iter().skip(1)) {
                prop_assert!(*next > end + 1);
            }
        }
    }
}
