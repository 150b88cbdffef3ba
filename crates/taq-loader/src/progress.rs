//! Progress bar for chunk loads

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar counting finished chunks.
///
/// Drawn on stderr; indicatif hides it automatically when stderr is not a
/// terminal. `visible = false` hides it unconditionally.
pub fn chunk_progress(total_chunks: usize, visible: bool) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(
        Some(total_chunks as u64),
        if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        },
    );
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} chunks {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_progress_length() {
        let pb = chunk_progress(8, false);
        assert_eq!(pb.length(), Some(8));
        assert!(pb.is_hidden());
        pb.inc(1);
        assert_eq!(pb.position(), 1);
    }
}
