//! Save functionality for trained processors.

use crate::processor::SubwordTextProcessor;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use subword_core::{Result, Rule, RuleMap, SubwordError, SubwordSet};

/// Writes a processor to its model-file representation.
pub struct ModelSaver<'a> {
    processor: &'a SubwordTextProcessor,
}

impl<'a> ModelSaver<'a> {
    pub fn new(processor: &'a SubwordTextProcessor) -> Self {
        Self { processor }
    }

    /// Write the model file, creating or truncating `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.write_to(path).map_err(|err| SubwordError::Io {
            path: path.to_path_buf(),
            err,
        })
    }

    fn write_to(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{}", self.processor.separator())?;

        write_rules(&mut writer, self.processor.source_bpe().rules())?;
        write_vocabulary(&mut writer, self.processor.source_vocabulary())?;

        // a shared rule set is persisted as zero target rules, even when the
        // processor keeps a second model instance for the target vocabulary
        match self.processor.target_bpe().filter(|_| !self.processor.shared_rules()) {
            Some(target) => write_rules(&mut writer, target.rules())?,
            None => writeln!(writer, "0")?,
        }
        write_vocabulary(&mut writer, self.processor.target_vocabulary())?;

        writer.flush()
    }
}

fn write_rules(writer: &mut impl Write, rules: &RuleMap) -> io::Result<()> {
    let mut ordered: Vec<(&Rule, u32)> = rules.iter().map(|(rule, &p)| (rule, p)).collect();
    ordered.sort_unstable_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| (&a.0.left, &a.0.right).cmp(&(&b.0.left, &b.0.right)))
    });

    writeln!(writer, "{}", ordered.len())?;
    for (rule, priority) in ordered {
        writeln!(writer, "{} {} {}", rule.left, rule.right, priority)?;
    }
    Ok(())
}

fn write_vocabulary(writer: &mut impl Write, vocabulary: &SubwordSet) -> io::Result<()> {
    let mut ordered: Vec<&str> = vocabulary.iter().map(|term| term.as_str()).collect();
    ordered.sort_unstable();

    writeln!(writer, "{}", ordered.len())?;
    for term in ordered {
        writeln!(writer, "{}", term)?;
    }
    Ok(())
}
