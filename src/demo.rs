//! The suite run by `rankreport run`: assertions that pass or fail
//! depending on which rank evaluates them.

use std::collections::BTreeSet;

use crate::harness::Harness;

pub const SUITE: &str = "BasicRanks";

/// Always equal to the rank.
fn rank_of(rank: usize) -> usize {
    rank
}

/// Never equal to the rank.
fn rank_plus_one(rank: usize) -> usize {
    rank + 1
}

/// Equal to the rank only on rank 0.
fn zero(_rank: usize) -> usize {
    0
}

/// Equal to the rank everywhere except rank 0.
fn nonzero_rank(rank: usize) -> usize {
    if rank == 0 { 1 } else { rank }
}

/// Builds the demo suite. `fail_on` selects the ranks on which
/// `FailOnSelectedRanks` fails; it passes everywhere when empty.
pub fn harness(fail_on: BTreeSet<usize>) -> Harness {
    let mut harness = Harness::new();
    harness
        .add(SUITE, "PassOnAllRanks", |ctx| {
            ctx.expect_eq(ctx.rank(), rank_of(ctx.rank()));
            Ok(())
        })
        .add(SUITE, "FailOnAllRanks", |ctx| {
            ctx.expect_eq(ctx.rank(), rank_plus_one(ctx.rank()));
            Ok(())
        })
        .add(SUITE, "FailExceptOnRankZero", |ctx| {
            ctx.expect_eq(ctx.rank(), zero(ctx.rank()));
            Ok(())
        })
        .add(SUITE, "PassExceptOnRankZero", |ctx| {
            ctx.expect_eq(ctx.rank(), nonzero_rank(ctx.rank()));
            Ok(())
        })
        .add(SUITE, "FailOnSelectedRanks", move |ctx| {
            let selected = fail_on.contains(&ctx.rank());
            ctx.assert_eq(selected, false)?;
            ctx.succeed("rank not selected to fail");
            Ok(())
        });
    harness
}
