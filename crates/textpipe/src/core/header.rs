//! Effective output header resolution.

use crate::plugins::Plugin;
use crate::types::Header;

/// Resolve the header the output writes.
///
/// Walks the Linear chain backward from the output. Stages that inherit their
/// header are skipped; the first stage (from the end) that does not inherit
/// supplies the effective header. If every Linear stage inherits, the result is
/// empty, meaning rows carry only the column values without names.
pub fn resolve_header<'a, I>(linear_chain: I) -> Header
where
    I: IntoIterator<Item = &'a dyn Plugin>,
    I::IntoIter: DoubleEndedIterator,
{
    for stage in linear_chain.into_iter().rev() {
        if !stage.inherit_header() {
            tracing::debug!(stage = stage.name(), "Effective header supplied by stage");
            return stage.output_header();
        }
    }
    Header::new()
}
