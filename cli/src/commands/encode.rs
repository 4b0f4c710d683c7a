//! Encode command implementation.

use clap::Parser;

/// Encode command arguments.
#[derive(Parser)]
pub struct EncodeCommand {
    /// Path to the trained subword model
    #[arg(short, long)]
    pub model: String,

    /// Input text file ("-" for stdin), one sentence per line
    #[arg(short, long)]
    pub input: String,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Encode with the target-side model instead of the source side
    #[arg(long, default_value_t = false)]
    pub target: bool,
}

use anyhow::Result as AnyhowResult;
use std::path::Path;
use subword_tokenizer::SubwordTextProcessor;

pub fn run(cmd: EncodeCommand) -> AnyhowResult<()> {
    let processor = SubwordTextProcessor::load(Path::new(&cmd.model))?;

    let input_text = if cmd.input == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&cmd.input)?
    };

    let lines: Vec<String> = input_text.lines().map(|line| line.to_string()).collect();
    let encoded = processor.encode_lines(&lines, !cmd.target);

    let mut rendered = String::new();
    for subwords in &encoded {
        let joined: Vec<&str> = subwords.iter().map(|subword| subword.as_str()).collect();
        rendered.push_str(&joined.join(" "));
        rendered.push('\n');
    }

    match &cmd.output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!("encoded {} lines to {}", encoded.len(), path);
        }
        None => {
            print!("{}", rendered);
        }
    }

    Ok(())
}
