//! Classifier engines.
//!
//! A word expert lives under a file prefix `<outdir>/<lemma>.<pos>.<lang>`:
//! the training instances in `<prefix>.train` and whatever the engine keeps
//! next to them. [`TimblEngine`] drives the external `timbl` binary;
//! [`Ib1Engine`] is an in-process IB1 (overlap metric, k nearest distances)
//! that reads the train file directly.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use clwsd_types::{Classification, Exemplar, UNKNOWN};
use tracing::{debug, info};

use crate::error::ClassifierError;

pub trait ClassifierEngine: Sync {
    fn name(&self) -> &str;

    /// Build the instance base for `<prefix>.train`.
    fn train(&self, prefix: &Path, options: &str) -> Result<(), ClassifierError>;

    fn load(&self, prefix: &Path, options: &str) -> Result<Box<dyn Classifier>, ClassifierError>;
}

pub trait Classifier {
    fn classify(&self, features: &[String]) -> Result<Classification, ClassifierError>;

    fn classify_batch(&self, rows: &[Vec<String>]) -> Result<Vec<Classification>, ClassifierError> {
        rows.iter().map(|row| self.classify(row)).collect()
    }
}

/// `<prefix><suffix>`, e.g. `bank.n.it` + `.train`.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

pub fn train_file(prefix: &Path) -> PathBuf {
    with_suffix(prefix, ".train")
}

/// Write exemplars as `f1 \t ... \t fn \t label` lines.
pub fn write_train_file(path: &Path, exemplars: &[Exemplar]) -> Result<(), ClassifierError> {
    let file = File::create(path).map_err(|e| ClassifierError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for exemplar in exemplars {
        for feature in &exemplar.features {
            write!(out, "{feature}\t").map_err(|e| ClassifierError::io(path, e))?;
        }
        writeln!(out, "{}", exemplar.label).map_err(|e| ClassifierError::io(path, e))?;
    }
    out.flush().map_err(|e| ClassifierError::io(path, e))
}

/// Read a train file back. Every line needs at least one feature and a label,
/// and all lines the same width.
pub fn read_train_file(path: &Path) -> Result<Vec<Exemplar>, ClassifierError> {
    let text = fs::read_to_string(path).map_err(|e| ClassifierError::io(path, e))?;
    let mut exemplars: Vec<Exemplar> = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut fields: Vec<String> = line.split('\t').map(str::to_string).collect();
        let Some(label) = fields.pop().filter(|_| !fields.is_empty()) else {
            return Err(ClassifierError::Format {
                path: path.to_path_buf(),
                line: lineno + 1,
                message: "expected features and a label".into(),
            });
        };
        if let Some(first) = exemplars.first()
            && first.features.len() != fields.len()
        {
            return Err(ClassifierError::Format {
                path: path.to_path_buf(),
                line: lineno + 1,
                message: format!(
                    "expected {} features, found {}",
                    first.features.len(),
                    fields.len()
                ),
            });
        }
        exemplars.push(Exemplar {
            features: fields,
            label,
        });
    }
    if exemplars.is_empty() {
        return Err(ClassifierError::Empty(path.to_path_buf()));
    }
    Ok(exemplars)
}

/// Value of `-k` in a timbl option string.
fn neighbours(options: &str) -> usize {
    let mut args = options.split_whitespace();
    while let Some(arg) = args.next() {
        let value = match arg.strip_prefix("-k") {
            Some("") => args.next(),
            Some(inline) => Some(inline),
            None => continue,
        };
        if let Some(k) = value.and_then(|v| v.parse().ok()).filter(|&k| k > 0) {
            return k;
        }
    }
    1
}

/// In-process IB1 with the overlap metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ib1Engine;

impl ClassifierEngine for Ib1Engine {
    fn name(&self) -> &str {
        "ib1"
    }

    fn train(&self, prefix: &Path, _options: &str) -> Result<(), ClassifierError> {
        let exemplars = read_train_file(&train_file(prefix))?;
        debug!("{}: {} instances", prefix.display(), exemplars.len());
        Ok(())
    }

    fn load(&self, prefix: &Path, options: &str) -> Result<Box<dyn Classifier>, ClassifierError> {
        Ok(Box::new(Ib1Classifier::new(
            read_train_file(&train_file(prefix))?,
            neighbours(options),
        )))
    }
}

pub struct Ib1Classifier {
    instances: Vec<Exemplar>,
    k: usize,
    class_counts: BTreeMap<String, usize>,
}

impl Ib1Classifier {
    pub fn new(instances: Vec<Exemplar>, k: usize) -> Self {
        let mut class_counts: BTreeMap<String, usize> = BTreeMap::new();
        for instance in &instances {
            *class_counts.entry(instance.label.clone()).or_default() += 1;
        }
        Self {
            instances,
            k: k.max(1),
            class_counts,
        }
    }

    fn width(&self) -> usize {
        self.instances.first().map_or(0, |i| i.features.len())
    }
}

impl Classifier for Ib1Classifier {
    /// The `k` nearest distance levels vote with one vote per instance. Ties
    /// go to the more frequent class in training, then to the smaller label.
    fn classify(&self, features: &[String]) -> Result<Classification, ClassifierError> {
        if features.len() != self.width() {
            return Err(ClassifierError::Width {
                expected: self.width(),
                found: features.len(),
            });
        }
        let distances: Vec<usize> = self
            .instances
            .iter()
            .map(|instance| {
                instance
                    .features
                    .iter()
                    .zip(features)
                    .filter(|(a, b)| a != b)
                    .count()
            })
            .collect();
        let mut levels = distances.clone();
        levels.sort_unstable();
        levels.dedup();
        levels.truncate(self.k);
        let Some(&cutoff) = levels.last() else {
            return Err(ClassifierError::Output("empty instance base".into()));
        };

        let mut distribution: BTreeMap<String, f64> = BTreeMap::new();
        for (instance, &d) in self.instances.iter().zip(&distances) {
            if d <= cutoff {
                *distribution.entry(instance.label.clone()).or_default() += 1.0;
            }
        }
        let label = distribution
            .iter()
            .max_by(|a, b| {
                a.1.total_cmp(b.1)
                    .then_with(|| self.class_counts.get(a.0).cmp(&self.class_counts.get(b.0)))
                    .then_with(|| b.0.cmp(a.0))
            })
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Ok(Classification {
            label,
            distribution,
            distance: levels[0] as f64,
        })
    }
}

/// The external `timbl` binary.
#[derive(Clone, Debug)]
pub struct TimblEngine {
    program: String,
}

impl Default for TimblEngine {
    fn default() -> Self {
        Self::new("timbl")
    }
}

impl TimblEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&OsStr], options: &str) -> Result<(), ClassifierError> {
        let status = Command::new(&self.program)
            .args(args)
            .args(options.split_whitespace())
            .status()
            .map_err(|e| ClassifierError::io(&self.program, e))?;
        if !status.success() {
            return Err(ClassifierError::Subprocess {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

impl ClassifierEngine for TimblEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn train(&self, prefix: &Path, options: &str) -> Result<(), ClassifierError> {
        let train = train_file(prefix);
        let ibase = with_suffix(prefix, ".ibase");
        info!("{} -f {}", self.program, train.display());
        self.run(
            &[
                OsStr::new("-F"),
                OsStr::new("Tabbed"),
                OsStr::new("-f"),
                train.as_os_str(),
                OsStr::new("-I"),
                ibase.as_os_str(),
            ],
            options,
        )
    }

    fn load(&self, prefix: &Path, options: &str) -> Result<Box<dyn Classifier>, ClassifierError> {
        let ibase = with_suffix(prefix, ".ibase");
        if !ibase.is_file() {
            return Err(ClassifierError::io(
                &ibase,
                std::io::Error::new(std::io::ErrorKind::NotFound, "instance base not found"),
            ));
        }
        Ok(Box::new(TimblClassifier {
            engine: self.clone(),
            ibase,
            options: options.to_string(),
        }))
    }
}

pub struct TimblClassifier {
    engine: TimblEngine,
    ibase: PathBuf,
    options: String,
}

impl Classifier for TimblClassifier {
    fn classify(&self, features: &[String]) -> Result<Classification, ClassifierError> {
        let mut out = self.classify_batch(&[features.to_vec()])?;
        out.pop()
            .ok_or_else(|| ClassifierError::Output("no output line".into()))
    }

    fn classify_batch(&self, rows: &[Vec<String>]) -> Result<Vec<Classification>, ClassifierError> {
        let dir = tempfile::tempdir().map_err(|e| ClassifierError::io(std::env::temp_dir(), e))?;
        let test = dir.path().join("batch.test");
        let output = dir.path().join("batch.out");
        let exemplars: Vec<Exemplar> = rows
            .iter()
            .map(|row| Exemplar {
                features: row.clone(),
                label: UNKNOWN.to_string(),
            })
            .collect();
        write_train_file(&test, &exemplars)?;
        self.engine.run(
            &[
                OsStr::new("-F"),
                OsStr::new("Tabbed"),
                OsStr::new("-i"),
                self.ibase.as_os_str(),
                OsStr::new("-t"),
                test.as_os_str(),
                OsStr::new("-o"),
                output.as_os_str(),
                OsStr::new("+v"),
                OsStr::new("db+di"),
            ],
            &self.options,
        )?;
        let text = fs::read_to_string(&output).map_err(|e| ClassifierError::io(&output, e))?;
        let results: Vec<Classification> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_timbl_line)
            .collect::<Result<_, _>>()?;
        if results.len() != rows.len() {
            return Err(ClassifierError::Output(format!(
                "{} rows in, {} results out",
                rows.len(),
                results.len()
            )));
        }
        Ok(results)
    }
}

/// Parse one line of `timbl +v db+di` output:
/// `f1 \t ... \t gold \t predicted { a 1.0, b 2.0 } \t distance`.
///
/// Features may themselves contain braces (`{NULL}` padding), so the
/// distribution is located from the end of the line.
pub fn parse_timbl_line(line: &str) -> Result<Classification, ClassifierError> {
    let malformed = || ClassifierError::Output(line.to_string());
    let (rest, tail) = line.rsplit_once('}').ok_or_else(malformed)?;
    let (head, body) = rest.rsplit_once('{').ok_or_else(malformed)?;
    let label = head
        .rsplit('\t')
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(malformed)?
        .to_string();
    let mut distribution = BTreeMap::new();
    for item in body.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let (class, score) = item.rsplit_once(' ').ok_or_else(malformed)?;
        let score: f64 = score.trim().parse().map_err(|_| malformed())?;
        *distribution.entry(class.trim().to_string()).or_default() += score;
    }
    let tail = tail.trim();
    let distance = if tail.is_empty() {
        0.0
    } else {
        tail.parse().map_err(|_| malformed())?
    };
    Ok(Classification {
        label,
        distribution,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clwsd_types::NULL_FEATURE;

    fn exemplar(features: &[&str], label: &str) -> Exemplar {
        Exemplar {
            features: features.iter().map(|f| f.to_string()).collect(),
            label: label.into(),
        }
    }

    fn row(features: &[&str]) -> Vec<String> {
        features.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn train_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("bank.n.it");
        let path = train_file(&prefix);
        assert!(path.ends_with("bank.n.it.train"));
        let exemplars = vec![
            exemplar(&["the", "bank", "is"], "banca"),
            exemplar(&["{NULL}", "bank", "of"], "riva"),
        ];
        write_train_file(&path, &exemplars).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "the\tbank\tis\tbanca\n{NULL}\tbank\tof\triva\n"
        );
        assert_eq!(read_train_file(&path).unwrap(), exemplars);
    }

    #[test]
    fn rejects_ragged_and_empty_train_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.train");
        fs::write(&path, "a\tb\tl1\na\tl2\n").unwrap();
        assert!(matches!(
            read_train_file(&path),
            Err(ClassifierError::Format { line: 2, .. })
        ));
        fs::write(&path, "").unwrap();
        assert!(matches!(read_train_file(&path), Err(ClassifierError::Empty(_))));
        fs::write(&path, "label\n").unwrap();
        assert!(matches!(
            read_train_file(&path),
            Err(ClassifierError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn reads_k_from_options() {
        assert_eq!(neighbours("-a 0 -k 1"), 1);
        assert_eq!(neighbours("-a 0 -k 3 -m M"), 3);
        assert_eq!(neighbours("-k5"), 5);
        assert_eq!(neighbours("-a 0"), 1);
        assert_eq!(neighbours("-k 0"), 1);
    }

    #[test]
    fn ib1_votes_over_nearest_distance() {
        let clf = Ib1Classifier::new(
            vec![
                exemplar(&["the", "bank", "is"], "banca"),
                exemplar(&["the", "bank", "was"], "banca"),
                exemplar(&["river", "bank", "is"], "riva"),
                exemplar(&["muddy", "bank", "of"], "riva"),
            ],
            1,
        );
        let c = clf.classify(&row(&["the", "bank", "is"])).unwrap();
        assert_eq!(c.label, "banca");
        assert_eq!(c.distance, 0.0);
        assert_eq!(c.distribution, BTreeMap::from([("banca".into(), 1.0)]));

        let c = clf.classify(&row(&["a", "bank", "is"])).unwrap();
        assert_eq!(c.distance, 1.0);
        assert_eq!(
            c.distribution,
            BTreeMap::from([("banca".into(), 1.0), ("riva".into(), 1.0)])
        );
    }

    #[test]
    fn ib1_k_widens_the_neighbourhood() {
        let clf = Ib1Classifier::new(
            vec![
                exemplar(&["a", "x"], "one"),
                exemplar(&["b", "y"], "two"),
                exemplar(&["c", "y"], "two"),
            ],
            2,
        );
        let c = clf.classify(&row(&["a", "z"])).unwrap();
        assert_eq!(c.distance, 1.0);
        assert_eq!(c.label, "two");
        assert_eq!(c.distribution["one"], 1.0);
        assert_eq!(c.distribution["two"], 2.0);
    }

    #[test]
    fn ib1_ties_prefer_frequent_classes() {
        let clf = Ib1Classifier::new(
            vec![
                exemplar(&["a"], "zeta"),
                exemplar(&["b"], "alpha"),
                exemplar(&["c"], "zeta"),
            ],
            1,
        );
        let c = clf.classify(&row(&["a"])).unwrap();
        assert_eq!(c.label, "zeta");
        let c = clf.classify(&row(&["q"])).unwrap();
        assert_eq!(c.label, "zeta");

        let even = Ib1Classifier::new(vec![exemplar(&["a"], "zeta"), exemplar(&["b"], "alpha")], 1);
        assert_eq!(even.classify(&row(&["q"])).unwrap().label, "alpha");
    }

    #[test]
    fn ib1_rejects_wrong_width() {
        let clf = Ib1Classifier::new(vec![exemplar(&["a", "b"], "x")], 1);
        assert!(matches!(
            clf.classify(&row(&["a"])),
            Err(ClassifierError::Width {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn ib1_engine_reads_the_train_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("bank.n.it");
        write_train_file(&train_file(&prefix), &[exemplar(&["bank"], "banca")]).unwrap();
        let engine = Ib1Engine;
        engine.train(&prefix, "-a 0 -k 1").unwrap();
        let clf = engine.load(&prefix, "-a 0 -k 1").unwrap();
        let batch = clf.classify_batch(&[row(&["bank"]), row(&["shore"])]).unwrap();
        assert!(batch.iter().all(|c| c.label == "banca"));
        assert!(engine.train(&dir.path().join("missing"), "").is_err());
    }

    #[test]
    fn parses_timbl_output() {
        let c = parse_timbl_line(
            "the\tbank\tis\t?\tbanca { banca 3.00000, riva 1.00000 }\t       0.1234",
        )
        .unwrap();
        assert_eq!(c.label, "banca");
        assert_eq!(c.distribution["banca"], 3.0);
        assert_eq!(c.distribution["riva"], 1.0);
        assert!((c.distance - 0.1234).abs() < 1e-12);

        let c = parse_timbl_line("a\t?\triva del fiume { riva del fiume 1.00000 }").unwrap();
        assert_eq!(c.label, "riva del fiume");
        assert_eq!(c.distribution["riva del fiume"], 1.0);
        assert_eq!(c.distance, 0.0);

        assert!(parse_timbl_line("a\tb\tc").is_err());
    }

    #[test]
    fn parses_timbl_output_with_padded_features() {
        let line = format!(
            "{NULL_FEATURE}\tbank\tis\t?\tbanca {{ banca 3.00000, riva 1.00000 }}\t 0.1"
        );
        let c = parse_timbl_line(&line).unwrap();
        assert_eq!(c.label, "banca");
        assert_eq!(c.distribution.len(), 2);
        assert_eq!(c.distribution["riva"], 1.0);
        assert!((c.distance - 0.1).abs() < 1e-12);

        let line = format!("is\tbank\t{NULL_FEATURE}\t?\triva {{ riva 2.00000 }}");
        assert_eq!(parse_timbl_line(&line).unwrap().label, "riva");
    }
}
