//! Feature vectors.
//!
//! A vector is the local window around the focus token, `context_size`
//! positions either side plus the focus itself, each contributing the word
//! and optionally its POS tag and lemma. Positions outside the sentence
//! contribute [`NULL_FEATURE`] once per channel, so the window part always
//! has [`FeatureConfig::window_len`] values. When bag-of-words features are
//! enabled and the focus word has a bag, one `1`/`0` indicator per keyword
//! follows.

use clwsd_types::{LemmaKey, NULL_FEATURE, TaggedSentence};

use crate::config::{BagScope, FeatureConfig};

pub fn extract(
    sentence: &TaggedSentence,
    focus: usize,
    config: &FeatureConfig,
    bag: Option<&[LemmaKey]>,
) -> Vec<String> {
    let mut features = local_features(sentence, focus, config);
    if config.bag
        && let Some(keywords) = bag
    {
        features.extend(bag_features(sentence, focus, keywords, config));
    }
    features
}

pub fn local_features(sentence: &TaggedSentence, focus: usize, config: &FeatureConfig) -> Vec<String> {
    let mut features = Vec::with_capacity(config.window_len());
    let context = config.context_size as isize;
    let focus = focus as isize;
    for j in focus - context..=focus + context {
        if config.window_boundary.contains(j, sentence.len()) {
            let j = j as usize;
            features.push(sentence.words[j].clone());
            if config.pos {
                features.push(sentence.postags[j].clone());
            }
            if config.lemma {
                features.push(sentence.lemmas[j].clone());
            }
        } else {
            for _ in 0..config.channels() {
                features.push(NULL_FEATURE.to_string());
            }
        }
    }
    features
}

/// One indicator per keyword, in the given order: `1` when a token other
/// than the focus has the keyword's lemma and POS within the configured
/// scope.
pub fn bag_features(
    sentence: &TaggedSentence,
    focus: usize,
    keywords: &[LemmaKey],
    config: &FeatureConfig,
) -> Vec<String> {
    let range = match config.bag_scope {
        BagScope::Sentence => 0..sentence.len(),
        BagScope::Window => {
            let start = focus.saturating_sub(config.context_size);
            let end = (focus + config.context_size + 1).min(sentence.len());
            start..end
        }
    };
    keywords
        .iter()
        .map(|keyword| {
            let found = range.clone().any(|j| {
                j != focus
                    && sentence.lemmas[j] == keyword.lemma
                    && sentence.postags[j] == keyword.pos
            });
            String::from(if found { "1" } else { "0" })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowBoundary;

    fn sentence(words: &str, postags: &str, lemmas: &str) -> TaggedSentence {
        let split = |s: &str| s.split(' ').map(str::to_string).collect::<Vec<_>>();
        TaggedSentence::from_tagger_output(split(words), split(postags), split(lemmas))
    }

    fn bank_sentence() -> TaggedSentence {
        sentence(
            "the bank is closed",
            "DT NN VBZ JJ",
            "the bank be closed",
        )
    }

    #[test]
    fn window_includes_the_focus_token() {
        let config = FeatureConfig {
            context_size: 1,
            ..FeatureConfig::default()
        };
        let features = extract(&bank_sentence(), 1, &config, None);
        assert_eq!(features, vec!["the", "bank", "is"]);
    }

    #[test]
    fn start_of_sentence_is_padded_per_channel() {
        let sent = sentence("wild animals roam", "JJ NNS VBP", "wild animal roam");
        let config = FeatureConfig {
            context_size: 2,
            pos: true,
            lemma: true,
            ..FeatureConfig::default()
        };
        let features = extract(&sent, 0, &config, None);
        assert_eq!(features.len(), 15);
        assert!(features[..6].iter().all(|f| f == NULL_FEATURE));
        assert_eq!(&features[6..9], &["wild", "j", "wild"]);
        assert_eq!(&features[12..15], &["roam", "v", "roam"]);
    }

    #[test]
    fn end_of_sentence_is_padded() {
        let config = FeatureConfig {
            context_size: 2,
            pos: true,
            ..FeatureConfig::default()
        };
        let features = extract(&bank_sentence(), 3, &config, None);
        assert_eq!(features.len(), 10);
        assert!(features[6..].iter().all(|f| f == NULL_FEATURE));
    }

    #[test]
    fn skip_first_token_boundary_nulls_index_zero() {
        let config = FeatureConfig {
            context_size: 1,
            window_boundary: WindowBoundary::SkipFirstToken,
            ..FeatureConfig::default()
        };
        let features = extract(&bank_sentence(), 1, &config, None);
        assert_eq!(features, vec![NULL_FEATURE, "bank", "is"]);
        let features = extract(&bank_sentence(), 0, &config, None);
        assert_eq!(features, vec![NULL_FEATURE, NULL_FEATURE, "bank"]);
    }

    #[test]
    fn length_is_fixed_for_every_position_and_config() {
        let sent = bank_sentence();
        let keywords = vec![LemmaKey::new("closed", "j"), LemmaKey::new("money", "n")];
        for context_size in 0..4 {
            for flags in 0..8u8 {
                let config = FeatureConfig {
                    context_size,
                    pos: flags & 1 != 0,
                    lemma: flags & 2 != 0,
                    bag: flags & 4 != 0,
                    ..FeatureConfig::default()
                };
                for focus in 0..sent.len() {
                    let features = extract(&sent, focus, &config, Some(&keywords));
                    assert_eq!(features.len(), config.vector_len(keywords.len()));
                }
            }
        }
    }

    #[test]
    fn bag_indicators_skip_the_focus_and_respect_scope() {
        let sent = sentence(
            "money in the bank by the river bank",
            "NN IN DT NN IN DT NN NN",
            "money in the bank by the river bank",
        );
        let keywords = vec![
            LemmaKey::new("bank", "n"),
            LemmaKey::new("money", "n"),
            LemmaKey::new("river", "n"),
        ];
        let config = FeatureConfig {
            context_size: 1,
            bag: true,
            ..FeatureConfig::default()
        };
        assert_eq!(bag_features(&sent, 3, &keywords, &config), vec!["1", "1", "1"]);

        let window = FeatureConfig {
            bag_scope: BagScope::Window,
            ..config
        };
        assert_eq!(bag_features(&sent, 3, &keywords, &window), vec!["0", "0", "0"]);
        assert_eq!(bag_features(&sent, 7, &keywords, &window), vec!["0", "0", "1"]);
    }

    #[test]
    fn missing_bag_adds_no_indicators() {
        let config = FeatureConfig {
            bag: true,
            ..FeatureConfig::default()
        };
        assert_eq!(extract(&bank_sentence(), 1, &config, None), vec!["bank"]);
    }
}
