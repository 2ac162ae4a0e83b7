//! Result records in the SemEval scorer formats.
//!
//! `best`: `lemma.pos.lang id :: s1;s2;` with every sense scoring at least
//! `threshold` times the best score, best first.
//! `oof`: `lemma.pos.lang id ::: s1;...;s5;` with the five best senses,
//! padded from the senses with the highest aggregated score over all
//! instances of the lemma.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use clwsd_types::{ExemplarKey, rank_distribution};
use tracing::debug;

pub const OOF_SIZE: usize = 5;

pub fn best_line(
    key: &ExemplarKey,
    id: u64,
    distribution: &BTreeMap<String, f64>,
    threshold: f64,
) -> String {
    let ranked = rank_distribution(distribution);
    let best = ranked.first().map_or(0.0, |(_, score)| *score);
    let senses: Vec<&str> = ranked
        .iter()
        .filter(|(_, score)| *score >= best * threshold)
        .map(|(sense, _)| *sense)
        .collect();
    format!("{key} {id} :: {};", senses.join(";"))
}

/// Collects the distributions of one lemma until all instances are known.
#[derive(Debug, Default)]
pub struct OutOfFive {
    instances: Vec<(ExemplarKey, u64, BTreeMap<String, f64>)>,
}

impl OutOfFive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ExemplarKey, id: u64, distribution: BTreeMap<String, f64>) {
        self.instances.push((key, id, distribution));
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The five senses with the highest summed score over all instances.
    pub fn baseline(&self) -> Vec<String> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for (_, _, distribution) in &self.instances {
            for (sense, score) in distribution {
                *totals.entry(sense.as_str()).or_default() += score;
            }
        }
        let mut totals: Vec<(&str, f64)> = totals.into_iter().collect();
        totals.sort_by(|a, b| b.1.total_cmp(&a.1));
        totals
            .into_iter()
            .take(OOF_SIZE)
            .map(|(sense, _)| sense.to_string())
            .collect()
    }

    pub fn lines(&self) -> Vec<String> {
        let baseline = self.baseline();
        debug!("out-of-five baseline: {baseline:?}");
        self.instances
            .iter()
            .map(|(key, id, distribution)| {
                let mut senses: Vec<&str> = rank_distribution(distribution)
                    .into_iter()
                    .take(OOF_SIZE)
                    .map(|(sense, _)| sense)
                    .collect();
                for sense in &baseline {
                    if senses.len() == OOF_SIZE {
                        break;
                    }
                    if !senses.contains(&sense.as_str()) {
                        senses.push(sense);
                    }
                }
                format!("{key} {id} ::: {};", senses.join(";"))
            })
            .collect()
    }

    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        for line in self.lines() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clwsd_types::LemmaKey;

    fn key() -> ExemplarKey {
        ExemplarKey::new(LemmaKey::new("bank", "n"), "it")
    }

    fn dist(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
        items.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn best_keeps_senses_near_the_top() {
        let d = dist(&[("banca", 10.0), ("riva", 9.5), ("istituto", 2.0)]);
        assert_eq!(best_line(&key(), 7, &d, 0.9), "bank.n.it 7 :: banca;riva;");
        assert_eq!(best_line(&key(), 7, &d, 1.0), "bank.n.it 7 :: banca;");
        assert_eq!(
            best_line(&key(), 7, &d, 0.0),
            "bank.n.it 7 :: banca;riva;istituto;"
        );
    }

    #[test]
    fn out_of_five_pads_from_the_aggregate() {
        let mut oof = OutOfFive::new();
        oof.push(key(), 1, dist(&[("banca", 3.0), ("riva", 1.0)]));
        oof.push(
            key(),
            2,
            dist(&[("a", 1.0), ("b", 1.5), ("c", 2.0), ("d", 2.5), ("e", 3.5), ("f", 0.5)]),
        );
        assert_eq!(oof.baseline(), vec!["e", "banca", "d", "c", "b"]);
        let lines = oof.lines();
        assert_eq!(lines[0], "bank.n.it 1 ::: banca;riva;e;d;c;");
        assert_eq!(lines[1], "bank.n.it 2 ::: e;d;c;b;a;");
    }

    #[test]
    fn writes_nothing_without_instances() {
        let oof = OutOfFive::new();
        let mut out = Vec::new();
        oof.write_to(&mut out).unwrap();
        assert!(out.is_empty());
        assert!(oof.is_empty());
    }
}
