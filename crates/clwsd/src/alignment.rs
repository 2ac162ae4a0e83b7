//! Finds the target-side translation of one source token.
//!
//! Two translation resources are supported. A phrase table proposes ranked
//! options for the source surface form, and the one that actually occurs in
//! the target sentence with the best P(target|source) wins, provided it is
//! not too far below the best option the table had to offer. An alignment
//! intersection gives the aligned target span directly.

use clwsd_corpus::{AlignmentIntersection, PhraseTable};
use tracing::debug;

/// Translation resource for one sentence pair.
#[derive(Clone, Copy, Debug)]
pub enum AlignmentSource<'a> {
    PhraseTable(&'a PhraseTable),
    Intersection(&'a AlignmentIntersection),
}

/// A located translation: surface text and its token span in the target
/// sentence.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedTarget {
    pub text: String,
    pub start: usize,
    pub len: usize,
    /// P(target|source) of the chosen phrase-table option.
    pub score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Found(AlignedTarget),
    /// No option occurs in the target sentence, or the token is unaligned.
    NotFound,
    /// The best option found scores below `best_possible * max_divergence`.
    BelowThreshold { best: f64, best_possible: f64 },
}

/// Resolve the translation of `source_word` at `source_index` in `target`.
pub fn resolve(
    source_index: usize,
    source_word: &str,
    target: &[String],
    source: AlignmentSource<'_>,
    max_divergence_from_best: f64,
) -> Resolution {
    match source {
        AlignmentSource::Intersection(intersection) => {
            match intersection.aligned_target(source_index) {
                Some(span) if span.start + span.len <= target.len() => {
                    Resolution::Found(AlignedTarget {
                        text: target[span.start..span.start + span.len].join(" "),
                        start: span.start,
                        len: span.len,
                        score: None,
                    })
                }
                _ => Resolution::NotFound,
            }
        }
        AlignmentSource::PhraseTable(table) => {
            let options = table.options(source_word);
            let Some(best_possible) = options
                .iter()
                .map(|o| o.p_target_given_source)
                .reduce(f64::max)
            else {
                return Resolution::NotFound;
            };
            let mut best: Option<AlignedTarget> = None;
            let mut best_score = 0.0;
            for option in options {
                let tokens = option.target_tokens();
                if tokens.is_empty() {
                    continue;
                }
                let Some(start) = find_phrase(target, &tokens) else {
                    continue;
                };
                if option.p_target_given_source > best_score {
                    best_score = option.p_target_given_source;
                    best = Some(AlignedTarget {
                        text: tokens.join(" "),
                        start,
                        len: tokens.len(),
                        score: Some(option.p_target_given_source),
                    });
                }
            }
            match best {
                None => Resolution::NotFound,
                Some(_) if best_score < best_possible * max_divergence_from_best => {
                    debug!(
                        "{source_word}: best option scores {best_score}, best possible {best_possible}"
                    );
                    Resolution::BelowThreshold {
                        best: best_score,
                        best_possible,
                    }
                }
                Some(found) => Resolution::Found(found),
            }
        }
    }
}

/// First position where `phrase` occurs as a contiguous run of `tokens`.
pub fn find_phrase<S: AsRef<str>>(tokens: &[String], phrase: &[S]) -> Option<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return None;
    }
    tokens
        .windows(phrase.len())
        .position(|window| window.iter().zip(phrase).all(|(a, b)| a == b.as_ref()))
}
