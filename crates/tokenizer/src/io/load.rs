//! Load functionality for persisted processors.
//!
//! Loading is strict: a declared count that does not match the lines
//! actually present, a rule line with the wrong number of fields, or an
//! unparsable priority all abort the load, and no processor is constructed.

use crate::processor::SubwordTextProcessor;
use compact_str::CompactString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use subword_core::{Result, Rule, RuleMap, SubwordError, SubwordSet};

/// Reads a processor back from its model-file representation.
pub struct ModelLoader;

impl ModelLoader {
    /// Load a processor from the model file at `path`.
    pub fn load(path: &Path) -> Result<SubwordTextProcessor> {
        let file = File::open(path).map_err(|err| SubwordError::Io {
            path: path.to_path_buf(),
            err,
        })?;
        let mut lines = BufReader::new(file).lines().map(|line| {
            line.map_err(|err| SubwordError::Io {
                path: path.to_path_buf(),
                err,
            })
        });
        Self::read(&mut lines)
    }

    fn read(lines: &mut impl Iterator<Item = Result<String>>) -> Result<SubwordTextProcessor> {
        let separator = next_line(lines, "separator")?;

        let source_rules = read_rules(lines, "source")?;
        let source_vocabulary = read_vocabulary(lines, "source")?;
        let target_rules = read_rules(lines, "target")?;
        let target_vocabulary = read_vocabulary(lines, "target")?;

        Ok(SubwordTextProcessor::new(
            source_rules,
            source_vocabulary,
            target_rules,
            target_vocabulary,
            separator,
        ))
    }
}

fn next_line(lines: &mut impl Iterator<Item = Result<String>>, what: &str) -> Result<String> {
    lines
        .next()
        .ok_or_else(|| SubwordError::Load(format!("model file ended while reading {}", what)))?
}

fn read_count(lines: &mut impl Iterator<Item = Result<String>>, what: &str) -> Result<usize> {
    let line = next_line(lines, what)?;
    line.trim_end()
        .parse()
        .map_err(|_| SubwordError::Load(format!("invalid {} count: {:?}", what, line)))
}

fn read_rules(lines: &mut impl Iterator<Item = Result<String>>, side: &str) -> Result<RuleMap> {
    let what = format!("{} rule count", side);
    let count = read_count(lines, &what)?;

    let mut rules = RuleMap::with_capacity(count);
    for i in 0..count {
        let line = next_line(lines, &format!("{} rule {} of {}", side, i + 1, count))?;
        let fields: Vec<&str> = line.split(' ').collect();
        let [left, right, priority] = fields.as_slice() else {
            return Err(SubwordError::Load(format!(
                "malformed {} rule line {:?}: expected \"<left> <right> <priority>\"",
                side, line
            )));
        };
        let priority: u32 = priority.parse().map_err(|_| {
            SubwordError::Load(format!("invalid priority in {} rule line {:?}", side, line))
        })?;
        rules.insert(Rule::new(*left, *right), priority);
    }
    Ok(rules)
}

fn read_vocabulary(
    lines: &mut impl Iterator<Item = Result<String>>,
    side: &str,
) -> Result<SubwordSet> {
    let what = format!("{} vocabulary count", side);
    let count = read_count(lines, &what)?;

    let mut vocabulary = SubwordSet::with_capacity(count);
    for i in 0..count {
        let line = next_line(lines, &format!("{} vocabulary entry {} of {}", side, i + 1, count))?;
        vocabulary.insert(CompactString::new(line));
    }
    Ok(vocabulary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::save::ModelSaver;
    use std::path::PathBuf;

    fn ok_lines(text: &str) -> impl Iterator<Item = Result<String>> + '_ {
        text.lines().map(|line| Ok(line.to_string()))
    }

    fn rules(entries: &[(&str, &str, u32)]) -> RuleMap {
        entries
            .iter()
            .map(|&(left, right, priority)| (Rule::new(left, right), priority))
            .collect()
    }

    fn vocabulary(entries: &[&str]) -> SubwordSet {
        entries.iter().map(|&e| CompactString::new(e)).collect()
    }

    #[test]
    fn test_read_minimal_model() {
        let text = "@@\n2\nl o 0\nlo w</w> 1\n2\nlo\nw\n0\n0\n";
        let processor = ModelLoader::read(&mut ok_lines(text)).unwrap();

        assert_eq!(processor.separator(), "@@");
        assert_eq!(processor.source_bpe().rules().len(), 2);
        assert!(processor.shared_rules());
        assert_eq!(processor.encode(&["low"], true), vec!["lo@@", "w"]);
    }

    #[test]
    fn test_truncated_rule_block_fails() {
        let text = "@@\n3\nl o 0\nlo w</w> 1\n";
        assert!(matches!(
            ModelLoader::read(&mut ok_lines(text)),
            Err(SubwordError::Load(_))
        ));
    }

    #[test]
    fn test_missing_vocabulary_block_fails() {
        let text = "@@\n1\nl o 0\n";
        assert!(matches!(
            ModelLoader::read(&mut ok_lines(text)),
            Err(SubwordError::Load(_))
        ));
    }

    #[test]
    fn test_malformed_rule_line_fails() {
        let two_fields = "@@\n1\nl o\n0\n0\n0\n";
        assert!(matches!(
            ModelLoader::read(&mut ok_lines(two_fields)),
            Err(SubwordError::Load(_))
        ));

        let four_fields = "@@\n1\nl o 0 extra\n0\n0\n0\n";
        assert!(matches!(
            ModelLoader::read(&mut ok_lines(four_fields)),
            Err(SubwordError::Load(_))
        ));
    }

    #[test]
    fn test_unparsable_priority_fails() {
        let text = "@@\n1\nl o high\n0\n0\n0\n";
        assert!(matches!(
            ModelLoader::read(&mut ok_lines(text)),
            Err(SubwordError::Load(_))
        ));
    }

    #[test]
    fn test_unparsable_count_fails() {
        let text = "@@\nmany\n";
        assert!(matches!(
            ModelLoader::read(&mut ok_lines(text)),
            Err(SubwordError::Load(_))
        ));
    }

    fn temp_model_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_save_load_round_trip() {
        let processor = SubwordTextProcessor::new(
            rules(&[("l", "o", 0), ("lo", "w</w>", 1)]),
            vocabulary(&["lo", "w", "low"]),
            rules(&[("b", "c</w>", 0)]),
            vocabulary(&["a", "bc"]),
            "@@",
        );
        let path = temp_model_path("subword_roundtrip.model");
        processor.save(&path).unwrap();
        let reloaded = SubwordTextProcessor::load(&path).unwrap();

        assert_eq!(reloaded.separator(), "@@");
        assert_eq!(reloaded.source_bpe().rules(), processor.source_bpe().rules());
        assert_eq!(reloaded.source_vocabulary(), processor.source_vocabulary());
        assert_eq!(reloaded.target_vocabulary(), processor.target_vocabulary());
        for word in ["low", "lower", "abc", "x"] {
            assert_eq!(
                reloaded.encode(&[word], true),
                processor.encode(&[word], true)
            );
            assert_eq!(
                reloaded.encode(&[word], false),
                processor.encode(&[word], false)
            );
        }

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_shared_rules_persist_as_zero_target_rules() {
        let processor = SubwordTextProcessor::new(
            rules(&[("l", "o", 0)]),
            vocabulary(&["lo"]),
            RuleMap::new(),
            vocabulary(&["l", "o"]),
            "@@",
        );
        // distinct target vocabulary forces a second model instance, but the
        // rule set is still shared
        assert!(processor.shared_rules());
        assert!(processor.target_bpe().is_some());

        let path = temp_model_path("subword_shared.model");
        processor.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // separator, 1 rule line after its count, vocabulary of one entry,
        // then a zero target-rule count
        assert_eq!(lines[0], "@@");
        assert_eq!(lines[1], "1");
        assert_eq!(lines[2], "l o 0");
        assert_eq!(lines[3], "1");
        assert_eq!(lines[4], "lo");
        assert_eq!(lines[5], "0");

        let reloaded = SubwordTextProcessor::load(&path).unwrap();
        assert!(reloaded.shared_rules());
        assert_eq!(
            reloaded.encode(&["lol"], false),
            processor.encode(&["lol"], false)
        );

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_saver_writes_rules_in_priority_order() {
        let processor = SubwordTextProcessor::new(
            rules(&[("c", "d", 2), ("a", "b", 0), ("b", "c", 1)]),
            SubwordSet::new(),
            RuleMap::new(),
            SubwordSet::new(),
            "@@",
        );
        let path = temp_model_path("subword_ordered.model");
        ModelSaver::new(&processor).save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(&lines[2..5], &["a b 0", "b c 1", "c d 2"]);

        std::fs::remove_file(path).ok();
    }
}
