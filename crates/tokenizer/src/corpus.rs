//! Training-corpus reader interface.
//!
//! A corpus yields `(source, target)` sentence pairs through a restartable
//! reader. Readers are plain values released by `Drop`, so they are closed
//! deterministically even when a scan aborts halfway through.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use subword_core::{Result, SubwordError};

/// One aligned sentence pair from a bilingual corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPair {
    pub source: String,
    pub target: String,
}

/// A reader positioned at the start of a corpus.
pub trait PairReader {
    /// The next sentence pair, or `None` once the corpus is exhausted.
    fn read_pair(&mut self) -> Result<Option<StringPair>>;
}

/// A bilingual corpus that can be read any number of times.
pub trait MultilingualCorpus {
    /// Open a fresh reader at the start of the corpus.
    fn open(&self) -> Result<Box<dyn PairReader>>;
}

/// A corpus stored as two line-aligned plain-text files.
pub struct FileCorpus {
    source_path: PathBuf,
    target_path: PathBuf,
}

impl FileCorpus {
    pub fn new(source_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
        }
    }
}

impl MultilingualCorpus for FileCorpus {
    fn open(&self) -> Result<Box<dyn PairReader>> {
        let open = |path: &Path| -> Result<Lines<BufReader<File>>> {
            let file = File::open(path).map_err(|err| SubwordError::Io {
                path: path.to_path_buf(),
                err,
            })?;
            Ok(BufReader::new(file).lines())
        };
        Ok(Box::new(FileCorpusReader {
            source: open(&self.source_path)?,
            target: open(&self.target_path)?,
            source_path: self.source_path.clone(),
            target_path: self.target_path.clone(),
        }))
    }
}

struct FileCorpusReader {
    source: Lines<BufReader<File>>,
    target: Lines<BufReader<File>>,
    source_path: PathBuf,
    target_path: PathBuf,
}

impl PairReader for FileCorpusReader {
    fn read_pair(&mut self) -> Result<Option<StringPair>> {
        let read = |line: Option<std::io::Result<String>>, path: &Path| -> Result<Option<String>> {
            line.transpose().map_err(|err| SubwordError::Io {
                path: path.to_path_buf(),
                err,
            })
        };
        let source = read(self.source.next(), &self.source_path)?;
        let target = read(self.target.next(), &self.target_path)?;
        match (source, target) {
            (Some(source), Some(target)) => Ok(Some(StringPair { source, target })),
            (None, None) => Ok(None),
            _ => Err(SubwordError::Corpus(format!(
                "line counts differ between {} and {}",
                self.source_path.display(),
                self.target_path.display()
            ))),
        }
    }
}

/// An in-memory corpus, mainly useful for tests and small experiments.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    pairs: Vec<StringPair>,
}

impl MemoryCorpus {
    pub fn new(pairs: Vec<StringPair>) -> Self {
        Self { pairs }
    }
}

impl MultilingualCorpus for MemoryCorpus {
    fn open(&self) -> Result<Box<dyn PairReader>> {
        Ok(Box::new(MemoryCorpusReader {
            pairs: self.pairs.clone(),
            next: 0,
        }))
    }
}

struct MemoryCorpusReader {
    pairs: Vec<StringPair>,
    next: usize,
}

impl PairReader for MemoryCorpusReader {
    fn read_pair(&mut self) -> Result<Option<StringPair>> {
        let pair = self.pairs.get(self.next).cloned();
        self.next += 1;
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_file_corpus_reads_aligned_pairs() {
        let source = write_temp("subword_corpus_src.txt", "the low bid\na new offer\n");
        let target = write_temp("subword_corpus_tgt.txt", "la oferta baja\nuna nueva oferta\n");
        let corpus = FileCorpus::new(&source, &target);

        let mut reader = corpus.open().unwrap();
        let first = reader.read_pair().unwrap().unwrap();
        assert_eq!(first.source, "the low bid");
        assert_eq!(first.target, "la oferta baja");
        assert!(reader.read_pair().unwrap().is_some());
        assert!(reader.read_pair().unwrap().is_none());

        // restartable: a second reader starts over
        let mut reader = corpus.open().unwrap();
        assert_eq!(reader.read_pair().unwrap().unwrap().source, "the low bid");

        std::fs::remove_file(source).ok();
        std::fs::remove_file(target).ok();
    }

    #[test]
    fn test_file_corpus_rejects_mismatched_line_counts() {
        let source = write_temp("subword_corpus_src_short.txt", "one line\n");
        let target = write_temp("subword_corpus_tgt_long.txt", "line one\nline two\n");
        let corpus = FileCorpus::new(&source, &target);

        let mut reader = corpus.open().unwrap();
        assert!(reader.read_pair().unwrap().is_some());
        assert!(matches!(
            reader.read_pair(),
            Err(SubwordError::Corpus(_))
        ));

        std::fs::remove_file(source).ok();
        std::fs::remove_file(target).ok();
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let corpus = FileCorpus::new("/nonexistent/source.txt", "/nonexistent/target.txt");
        assert!(matches!(corpus.open(), Err(SubwordError::Io { .. })));
    }

    #[test]
    fn test_memory_corpus() {
        let corpus = MemoryCorpus::new(vec![StringPair {
            source: "hello".into(),
            target: "hola".into(),
        }]);
        let mut reader = corpus.open().unwrap();
        assert_eq!(reader.read_pair().unwrap().unwrap().target, "hola");
        assert!(reader.read_pair().unwrap().is_none());
    }
}
