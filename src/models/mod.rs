mod digest;
mod outcome;
mod test_id;

pub use digest::{DigestEntry, FailureDigest};
pub use outcome::{OutcomeKind, OutcomeRecord};
pub use test_id::TestId;
