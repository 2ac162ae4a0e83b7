//! Sense labels.
//!
//! The label of an occurrence is the aligned target text, lemmatised when the
//! target side was tagged. The registry's sense inventory plays no part in
//! generation; it only decides which source lemmas are worth extracting and,
//! optionally, prunes test-time distributions.

use std::collections::BTreeMap;

use clwsd_corpus::TargetWords;
use clwsd_types::{LemmaKey, TaggedSentence};

use crate::alignment::AlignedTarget;

/// Whether occurrences of `key` are extracted at all.
pub fn is_relevant(registry: &TargetWords, key: &LemmaKey) -> bool {
    registry.contains(key)
}

/// The sense label for a resolved occurrence: the space-joined target lemmas
/// over the aligned span, or the surface text without a target tagger.
pub fn sense_label(found: &AlignedTarget, target: Option<&TaggedSentence>) -> String {
    match target {
        Some(tagged) if found.start + found.len <= tagged.len() => {
            tagged.lemmas[found.start..found.start + found.len].join(" ")
        }
        _ => found.text.clone(),
    }
}

/// The registry sense matching a predicted label, case-insensitively, or for
/// single words by a crude stem comparison (the sense minus its last
/// character is a prefix of the label, and the lengths differ by at most 6).
pub fn target_match<'a>(label: &str, senses: &'a [String]) -> Option<&'a str> {
    let label = label.to_lowercase();
    if let Some(sense) = senses.iter().find(|s| s.to_lowercase() == label) {
        return Some(sense.as_str());
    }
    if label.contains(' ') {
        return None;
    }
    senses
        .iter()
        .find(|sense| {
            let sense = sense.to_lowercase();
            let mut stem = sense.chars();
            stem.next_back();
            let stem = stem.as_str();
            !stem.is_empty()
                && label.starts_with(stem)
                && label.chars().count().abs_diff(sense.chars().count()) <= 6
        })
        .map(String::as_str)
}

/// Keep only distribution entries matching a known sense, folding scores of
/// variants onto the registry spelling. Returns the input unchanged when
/// nothing matches.
pub fn constrain_distribution(
    distribution: &BTreeMap<String, f64>,
    senses: &[String],
) -> BTreeMap<String, f64> {
    let mut kept: BTreeMap<String, f64> = BTreeMap::new();
    for (label, score) in distribution {
        if let Some(sense) = target_match(label, senses) {
            *kept.entry(sense.to_string()).or_default() += score;
        }
    }
    if kept.is_empty() {
        distribution.clone()
    } else {
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn senses(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn label_uses_target_lemmas_over_the_span() {
        let tagged = TaggedSentence::from_tagger_output(
            vec!["le".into(), "banche".into(), "chiuse".into()],
            vec!["DET".into(), "NOM".into(), "VER".into()],
            vec!["il".into(), "banca".into(), "chiudere".into()],
        );
        let found = AlignedTarget {
            text: "banche chiuse".into(),
            start: 1,
            len: 2,
            score: None,
        };
        assert_eq!(sense_label(&found, Some(&tagged)), "banca chiudere");
        assert_eq!(sense_label(&found, None), "banche chiuse");
    }

    #[test]
    fn matches_case_and_crude_stems() {
        let inventory = senses(&["banca", "riva", "argine del fiume"]);
        assert_eq!(target_match("Banca", &inventory), Some("banca"));
        assert_eq!(target_match("banche", &inventory), Some("banca"));
        assert_eq!(target_match("rive", &inventory), Some("riva"));
        assert_eq!(target_match("argine del fiume", &inventory), Some("argine del fiume"));
        assert_eq!(target_match("argini del fiume", &inventory), None);
        assert_eq!(target_match("sponda", &inventory), None);
    }

    #[test]
    fn constraint_falls_back_to_the_full_distribution() {
        let inventory = senses(&["banca", "riva"]);
        let dist = BTreeMap::from([
            ("banche".to_string(), 2.0),
            ("banca".to_string(), 1.0),
            ("istituto".to_string(), 4.0),
        ]);
        let kept = constrain_distribution(&dist, &inventory);
        assert_eq!(kept, BTreeMap::from([("banca".to_string(), 3.0)]));

        let other = BTreeMap::from([("istituto".to_string(), 4.0)]);
        assert_eq!(constrain_distribution(&other, &inventory), other);
    }
}
