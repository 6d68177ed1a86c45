//! The shared merger contract.

use restitch_core::format::OutputFormat;
use restitch_core::fragment::Fragment;
use restitch_core::result::MergeResult;

/// One format-specific merge strategy.
///
/// Implementations are pure and stateless: `merge` never mutates the
/// fragments, never reorders them, and deduplicates only at the boundary of
/// the two fragments being joined (repeated headers, repeated fences).
pub trait Merger: Send + Sync {
    /// The format this merger handles.
    fn format(&self) -> OutputFormat;

    /// Whether `content` ends in a syntactically open structure — an
    /// unterminated row, an unclosed bracket, an open code fence.
    fn has_incomplete_structure(&self, content: &str) -> bool;

    /// Merge the fragment sequence into one artifact. Fragments are joined
    /// in receipt order; a failed merge still returns its best-available
    /// content rather than dropping data.
    fn merge(&self, fragments: &[Fragment]) -> MergeResult;

    /// Build the format-aware instruction sent with a continuation request,
    /// describing what structure was mid-generation in `accumulated`.
    fn continuation_hint(&self, accumulated: &str) -> String;

    /// The raw text this merger reads from a fragment.
    fn fragment_text<'a>(&self, fragment: &'a Fragment) -> &'a str {
        fragment.content.as_str()
    }
}
