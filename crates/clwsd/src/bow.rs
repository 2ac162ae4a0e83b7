//! Bag-of-words keyword selection.
//!
//! The first pass over the corpus fills a [`CooccurrenceCounts`] table: the
//! corpus frequency of every `(lemma, pos)` and, for every resolved focus
//! occurrence, how often each other word of the sentence co-occurs with the
//! focus word's sense. Keywords are then picked per focus word by frequency,
//! co-occurrence count and
//!
//! ```text
//! P(sense | keyword) = (Ns_kloc / Nkloc) * (1 / Nkcorp)
//! ```
//!
//! where `Ns_kloc` counts the keyword with this sense, `Nkloc` counts it with
//! any sense of the focus word and `Nkcorp` is its corpus frequency.

use std::collections::{BTreeMap, HashMap};

use clwsd_corpus::BagEntry;
use clwsd_types::{LemmaKey, TaggedSentence};
use tracing::{debug, info};

use crate::config::BowParams;

/// Bags with at most this many entries loosen the absolute threshold.
pub const MIN_BAG_SIZE: usize = 5;
/// Bags with at least this many entries tighten it.
pub const MAX_BAG_SIZE: usize = 500;

type SenseCounts = BTreeMap<String, BTreeMap<LemmaKey, u64>>;

#[derive(Clone, Debug, Default)]
pub struct CooccurrenceCounts {
    local: BTreeMap<LemmaKey, SenseCounts>,
    corpus: HashMap<LemmaKey, u64>,
}

impl CooccurrenceCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one corpus token.
    pub fn count_token(&mut self, key: LemmaKey) {
        *self.corpus.entry(key).or_default() += 1;
    }

    /// Count every token of `sentence` except `focus_index` as co-occurring
    /// with `sense` of `focus`.
    pub fn count_occurrence(
        &mut self,
        focus: &LemmaKey,
        sense: &str,
        sentence: &TaggedSentence,
        focus_index: usize,
    ) {
        let senses = self.local.entry(focus.clone()).or_default();
        let counts = senses.entry(sense.to_string()).or_default();
        for (j, _, pos, lemma) in sentence.tokens() {
            if j != focus_index {
                *counts.entry(LemmaKey::new(lemma, pos)).or_default() += 1;
            }
        }
    }

    /// Record `n` co-occurrences directly.
    pub fn add_cooccurrence(&mut self, focus: &LemmaKey, sense: &str, keyword: LemmaKey, n: u64) {
        *self
            .local
            .entry(focus.clone())
            .or_default()
            .entry(sense.to_string())
            .or_default()
            .entry(keyword)
            .or_default() += n;
    }

    pub fn add_corpus_count(&mut self, keyword: LemmaKey, n: u64) {
        *self.corpus.entry(keyword).or_default() += n;
    }

    pub fn corpus_count(&self, keyword: &LemmaKey) -> u64 {
        self.corpus.get(keyword).copied().unwrap_or(0)
    }

    pub fn cooccurrence(&self, focus: &LemmaKey, sense: &str, keyword: &LemmaKey) -> u64 {
        self.local
            .get(focus)
            .and_then(|senses| senses.get(sense))
            .and_then(|counts| counts.get(keyword))
            .copied()
            .unwrap_or(0)
    }

    /// Focus words with at least one counted occurrence.
    pub fn focus_words(&self) -> impl Iterator<Item = &LemmaKey> + '_ {
        self.local.keys()
    }

    /// P(sense | keyword) for one focus word. Unseen focus words, senses and
    /// keywords give 0.
    pub fn probability(&self, focus: &LemmaKey, sense: &str, keyword: &LemmaKey) -> f64 {
        let Some(senses) = self.local.get(focus) else {
            debug!("focus word not seen: {focus}");
            return 0.0;
        };
        let Some(with_sense) = senses.get(sense) else {
            debug!("sense not seen: {sense} ({focus})");
            return 0.0;
        };
        let Some(&n_corpus) = self.corpus.get(keyword) else {
            debug!("keyword not seen: {keyword}");
            return 0.0;
        };
        let ns_local = with_sense.get(keyword).copied().unwrap_or(0) as f64;
        let n_local: u64 = senses.values().filter_map(|c| c.get(keyword)).sum();
        if n_local == 0 || n_corpus == 0 {
            return 0.0;
        }
        (ns_local / n_local as f64) * (1.0 / n_corpus as f64)
    }

    /// Keywords of `focus` passing all three thresholds, sorted by keyword,
    /// then sense.
    pub fn make_bag(&self, focus: &LemmaKey, params: &BowParams, absolute_threshold: u64) -> Vec<BagEntry> {
        let Some(senses) = self.local.get(focus) else {
            return Vec::new();
        };
        let mut bag = Vec::new();
        for (sense, counts) in senses {
            for (keyword, &count) in counts {
                if self.corpus_count(keyword) < params.filter_threshold || count < absolute_threshold {
                    continue;
                }
                let probability = self.probability(focus, sense, keyword);
                if probability >= params.prob_threshold {
                    bag.push(BagEntry {
                        keyword: keyword.clone(),
                        sense: sense.clone(),
                        count,
                        probability,
                    });
                }
            }
        }
        bag.sort_by(|a, b| {
            a.keyword
                .cmp(&b.keyword)
                .then_with(|| a.sense.cmp(&b.sense))
                .then_with(|| a.count.cmp(&b.count))
                .then_with(|| a.probability.total_cmp(&b.probability))
        });
        bag
    }

    /// The bag of `focus`, tuning the absolute threshold when
    /// `params.adaptive` is set: lowered one step at a time while the bag
    /// has at most [`MIN_BAG_SIZE`] entries and the threshold is above 1,
    /// raised while it has at least [`MAX_BAG_SIZE`].
    pub fn select_bag(&self, focus: &LemmaKey, params: &BowParams) -> Vec<BagEntry> {
        let mut threshold = params.absolute_threshold;
        let mut bag = self.make_bag(focus, params, threshold);
        if params.adaptive {
            if bag.len() <= MIN_BAG_SIZE {
                while bag.len() <= MIN_BAG_SIZE && threshold > 1 {
                    threshold -= 1;
                    bag = self.make_bag(focus, params, threshold);
                }
            } else if bag.len() >= MAX_BAG_SIZE {
                while bag.len() >= MAX_BAG_SIZE {
                    threshold += 1;
                    bag = self.make_bag(focus, params, threshold);
                }
            }
        }
        info!(
            "{focus}: {} keywords (absolute threshold {threshold})",
            bag.len()
        );
        bag
    }
}

/// Distinct keywords of a sorted bag in order. This is the indicator order
/// of the feature vector, and the order a bag file reads back in.
pub fn bag_keywords(bag: &[BagEntry]) -> Vec<LemmaKey> {
    let mut keywords: Vec<LemmaKey> = Vec::new();
    for entry in bag {
        if !keywords.contains(&entry.keyword) {
            keywords.push(entry.keyword.clone());
        }
    }
    keywords
}
