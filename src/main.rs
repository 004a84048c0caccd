//! textvec command-line entry point.
//!
//! Reads one text per line, embeds the corpus with the chosen method, and
//! prints the vectors (or their pairwise cosine similarities) as JSON.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textvec::config::Config;
use textvec::embedder::{Method, build_embedder};
use textvec::similarity::similarity_matrix;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Sif,
    Doc2vec,
    Transformer,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Sif => Method::Sif,
            MethodArg::Doc2vec => Method::Doc2Vec,
            MethodArg::Transformer => Method::Transformer,
        }
    }
}

#[derive(Parser)]
#[command(name = "textvec")]
#[command(about = "Embed texts as vectors with SIF, doc2vec, or a pretrained transformer")]
#[command(version)]
struct Args {
    /// Embedding method
    #[arg(long, short, value_enum, default_value = "sif")]
    method: MethodArg,

    /// Word vectors (sif) or encoder (transformer) to use
    #[arg(long)]
    model: Option<String>,

    /// Train word vectors on the input instead of loading pretrained ones (sif)
    #[arg(long, conflicts_with = "model")]
    no_model: bool,

    /// Embedding dimensionality (sif without a model, doc2vec)
    #[arg(long, short)]
    dimensions: Option<usize>,

    /// Path to a JSON configuration file
    #[arg(long, short, default_value = "")]
    config: String,

    /// Seed for the training RNG
    #[arg(long)]
    seed: Option<u64>,

    /// File with one text per line (stdin when omitted)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Print the pairwise cosine similarity matrix instead of the vectors
    #[arg(long)]
    similarity: bool,
}

fn apply_args(config: &mut Config, args: &Args) {
    let method = Method::from(args.method);
    if let Some(model) = &args.model {
        match method {
            Method::Sif => config.sif.model = Some(model.clone()).filter(|m| !m.is_empty()),
            Method::Transformer => config.transformer.model = model.clone(),
            Method::Doc2Vec => tracing::warn!("--model is ignored by doc2vec"),
        }
    }
    if args.no_model {
        config.sif.model = None;
    }
    if let Some(dimensions) = args.dimensions {
        config.sif.dimensions = dimensions;
        config.doc2vec.dimensions = dimensions;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
}

fn read_texts(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textvec=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(&args.config).context("Failed to load config")?;
    apply_args(&mut config, &args);
    config.validate()?;

    let raw = read_texts(args.input.as_ref())?;
    let texts: Vec<&str> = raw.lines().collect();

    let method = Method::from(args.method);
    tracing::info!("Embedding {} texts with {method}", texts.len());
    let embedder = build_embedder(method, &config);
    let vectors = embedder
        .embed(&texts)
        .with_context(|| format!("{method} embedding failed"))?;

    let json = if args.similarity {
        serde_json::to_string(&similarity_matrix(&vectors))?
    } else {
        serde_json::to_string(&vectors)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}
