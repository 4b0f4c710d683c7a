//! Train command implementation.

use clap::Parser;

/// Train command arguments.
#[derive(Parser)]
pub struct TrainCommand {
    /// Source-side corpus files, line-aligned with --target-corpus
    #[arg(long, num_args = 1.., required = true)]
    pub source_corpus: Vec<String>,

    /// Target-side corpus files, line-aligned with --source-corpus
    #[arg(long, num_args = 1.., required = true)]
    pub target_corpus: Vec<String>,

    /// Output model file
    #[arg(short, long)]
    pub output: String,

    /// JSON file with builder hyperparameters (flags below override it)
    #[arg(long)]
    pub config: Option<String>,

    /// Number of merge rules to learn per model
    #[arg(long)]
    pub max_rules: Option<usize>,

    /// Minimum pair frequency for learning a rule
    #[arg(long)]
    pub min_frequency: Option<i64>,

    /// Inter-subword separator
    #[arg(long)]
    pub separator: Option<String>,

    /// Keep at most this many vocabulary entries per side
    #[arg(long)]
    pub max_vocabulary_size: Option<usize>,

    /// Keep the vocabulary entries covering this fraction of subword mass
    #[arg(long)]
    pub vocab_pruning_threshold: Option<f64>,

    /// Alphabet similarity above which one shared rule set is trained
    #[arg(long)]
    pub similarity_threshold: Option<f64>,
}

use anyhow::{bail, Context, Result as AnyhowResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use subword_tokenizer::{BuilderConfig, FileCorpus, MultilingualCorpus, ProcessorBuilder};

pub fn run(cmd: TrainCommand) -> AnyhowResult<()> {
    let mut config: BuilderConfig = match &cmd.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening config {}", path))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing config {}", path))?
        }
        None => BuilderConfig::default(),
    };
    if let Some(max_rules) = cmd.max_rules {
        config.max_rules = max_rules;
    }
    if let Some(min_frequency) = cmd.min_frequency {
        config.min_frequency = min_frequency;
    }
    if let Some(separator) = cmd.separator {
        config.separator = separator;
    }
    if let Some(size) = cmd.max_vocabulary_size {
        config.max_vocabulary_size = Some(size);
    }
    if let Some(threshold) = cmd.vocab_pruning_threshold {
        config.vocab_pruning_threshold = Some(threshold);
    }
    if let Some(threshold) = cmd.similarity_threshold {
        config.similarity_threshold = threshold;
    }

    if cmd.source_corpus.len() != cmd.target_corpus.len() {
        bail!(
            "{} source corpus files but {} target corpus files",
            cmd.source_corpus.len(),
            cmd.target_corpus.len()
        );
    }
    let corpora: Vec<Box<dyn MultilingualCorpus>> = cmd
        .source_corpus
        .iter()
        .zip(&cmd.target_corpus)
        .map(|(source, target)| {
            Box::new(FileCorpus::new(source, target)) as Box<dyn MultilingualCorpus>
        })
        .collect();

    let processor = ProcessorBuilder::from_config(config).build(&corpora)?;
    processor.save(Path::new(&cmd.output))?;
    println!("model written to {}", cmd.output);

    Ok(())
}
