mod counter;
mod delete;
mod predicate;
mod read;
mod write;

pub use counter::*;
pub use delete::*;
pub use predicate::*;
pub use read::*;
pub use write::*;

use crate::separated_by;

/// Human readable `a = 1 AND b > 2`.
pub(crate) fn predicates_text(out: &mut String, predicates: &[Predicate]) {
    separated_by(
        out,
        predicates,
        |out, v| out.push_str(&v.to_string()),
        " AND ",
    );
}
