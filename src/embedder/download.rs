/// Model file resolution and auto-download.
///
/// Turns a model identifier into local files: pretrained word vectors from
/// the Stanford GloVe archives or gensim-data releases, and ONNX
/// sentence-transformer exports from HuggingFace. Files already present are
/// never downloaded again.
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use tracing::info;

use super::EmbedderError;

/// Base URL for HuggingFace model files.
const HF_BASE: &str = "https://huggingface.co";

/// Organisation assumed for transformer names without one.
const DEFAULT_HF_ORG: &str = "sentence-transformers";

/// Files required for a transformer embedder, with their paths in the repo.
const TRANSFORMER_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
    ("config.json", "config.json"),
];

/// Where the Stanford GloVe archives are published.
const GLOVE_BASE: &str = "https://nlp.stanford.edu/data";

/// Known GloVe names with their archive and the entry inside it.
const GLOVE_MODELS: &[(&str, &str, &str)] = &[
    ("glove-wiki-gigaword-50", "glove.6B.zip", "glove.6B.50d.txt"),
    ("glove-wiki-gigaword-100", "glove.6B.zip", "glove.6B.100d.txt"),
    ("glove-wiki-gigaword-200", "glove.6B.zip", "glove.6B.200d.txt"),
    ("glove-wiki-gigaword-300", "glove.6B.zip", "glove.6B.300d.txt"),
    ("glove-twitter-25", "glove.twitter.27B.zip", "glove.twitter.27B.25d.txt"),
    ("glove-twitter-50", "glove.twitter.27B.zip", "glove.twitter.27B.50d.txt"),
    ("glove-twitter-100", "glove.twitter.27B.zip", "glove.twitter.27B.100d.txt"),
    ("glove-twitter-200", "glove.twitter.27B.zip", "glove.twitter.27B.200d.txt"),
];

/// Release downloads of the gensim-data catalogue.
const GENSIM_DATA_BASE: &str = "https://github.com/RaRe-Technologies/gensim-data/releases/download";

/// On-disk format of a word-vector file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    Text,
    Binary,
}

impl VectorFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Binary => "bin",
        }
    }
}

/// Non-GloVe word-vector releases of gensim-data, each a single gzip file.
const GENSIM_DATA_MODELS: &[(&str, VectorFormat)] = &[
    ("fasttext-wiki-news-subwords-300", VectorFormat::Text),
    ("conceptnet-numberbatch-17-06-300", VectorFormat::Text),
    ("word2vec-google-news-300", VectorFormat::Binary),
    ("word2vec-ruscorpora-300", VectorFormat::Binary),
];

// ── Word vectors ─────────────────────────────────────────────────────

/// Archive and entry for a known GloVe model name.
#[must_use]
pub fn glove_entry(model: &str) -> Option<(&'static str, &'static str)> {
    GLOVE_MODELS
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|&(_, archive, entry)| (archive, entry))
}

/// File format of a known gensim-data word-vector release.
#[must_use]
pub fn gensim_data_format(model: &str) -> Option<VectorFormat> {
    GENSIM_DATA_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|&(_, format)| format)
}

/// Resolve a word-vector identifier to a local vectors file.
///
/// An existing file path is returned as is. GloVe names are extracted from the
/// Stanford archives and other gensim-data names are fetched from their
/// release, downloading into `models_dir` first if needed. Binary files get a
/// `.bin` extension.
pub fn ensure_word_vectors(models_dir: &Path, model: &str) -> Result<PathBuf, EmbedderError> {
    let direct = Path::new(model);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    if let Some((archive_name, entry)) = glove_entry(model) {
        let dest = models_dir.join(format!("{model}.txt"));
        if dest.is_file() {
            info!("Word vectors found at {}", dest.display());
            return Ok(dest);
        }

        fs::create_dir_all(models_dir)?;
        let archive = models_dir.join(archive_name);
        if !archive.is_file() {
            info!("Downloading {archive_name} (one-time)...");
            download_file(&archive, &format!("{GLOVE_BASE}/{archive_name}"), model)?;
        }

        extract_zip_entry(&archive, entry, &dest)?;
        return Ok(dest);
    }

    let format =
        gensim_data_format(model).ok_or_else(|| EmbedderError::UnknownModel(model.to_string()))?;
    let dest = models_dir.join(format!("{model}.{}", format.extension()));
    if dest.is_file() {
        info!("Word vectors found at {}", dest.display());
        return Ok(dest);
    }

    fs::create_dir_all(models_dir)?;
    let compressed = models_dir.join(format!("{model}.gz"));
    if !compressed.is_file() {
        info!("Downloading {model} from gensim-data (one-time)...");
        let url = format!("{GENSIM_DATA_BASE}/{model}/{model}.gz");
        download_file(&compressed, &url, model)?;
    }

    decompress_gzip(&compressed, &dest)?;
    fs::remove_file(&compressed)?;
    Ok(dest)
}

/// Decompress a gzip file to `dest`.
pub fn decompress_gzip(source: &Path, dest: &Path) -> Result<(), EmbedderError> {
    info!("Decompressing {}", source.display());
    let file = fs::File::open(source)?;
    let mut decoder = flate2::read::GzDecoder::new(BufReader::new(file));

    let part = part_path(dest);
    let mut out = BufWriter::new(fs::File::create(&part)?);
    std::io::copy(&mut decoder, &mut out).map_err(|e| {
        EmbedderError::ModelLoadFailed(format!("invalid gzip {}: {e}", source.display()))
    })?;
    out.flush()?;
    drop(out);
    fs::rename(&part, dest)?;
    Ok(())
}

/// Copy one entry of a zip archive to `dest`.
pub fn extract_zip_entry(archive: &Path, entry: &str, dest: &Path) -> Result<(), EmbedderError> {
    info!("Extracting {entry} from {}", archive.display());
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        EmbedderError::ModelLoadFailed(format!("invalid archive {}: {e}", archive.display()))
    })?;
    let mut source = zip.by_name(entry).map_err(|e| {
        EmbedderError::ModelLoadFailed(format!("{entry} not in {}: {e}", archive.display()))
    })?;

    let part = part_path(dest);
    let mut out = BufWriter::new(fs::File::create(&part)?);
    std::io::copy(&mut source, &mut out)?;
    out.flush()?;
    drop(out);
    fs::rename(&part, dest)?;
    Ok(())
}

// ── Transformers ─────────────────────────────────────────────────────

/// HuggingFace repository for a transformer name.
#[must_use]
pub fn transformer_repo(model: &str) -> String {
    if model.contains('/') {
        model.to_string()
    } else {
        format!("{DEFAULT_HF_ORG}/{model}")
    }
}

/// Local directory for a transformer repository.
#[must_use]
pub fn transformer_dir(models_dir: &Path, model: &str) -> PathBuf {
    models_dir
        .join("transformers")
        .join(transformer_repo(model).replace('/', "--"))
}

/// Check whether all transformer files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    TRANSFORMER_FILES
        .iter()
        .all(|(name, _)| model_dir.join(name).exists())
}

/// Resolve a transformer identifier to a directory with its model files.
///
/// A local directory containing `model.onnx` is used as is. Otherwise the
/// files are downloaded from HuggingFace, skipping those already present.
pub fn ensure_transformer_files(models_dir: &Path, model: &str) -> Result<PathBuf, EmbedderError> {
    let direct = Path::new(model);
    if direct.join("model.onnx").is_file() {
        return Ok(direct.to_path_buf());
    }
    if model.is_empty() || model.contains("..") || model.starts_with('/') {
        return Err(EmbedderError::UnknownModel(model.to_string()));
    }

    let model_dir = transformer_dir(models_dir, model);
    if all_files_present(&model_dir) {
        info!("Transformer files found in {}", model_dir.display());
        return Ok(model_dir);
    }

    fs::create_dir_all(&model_dir)?;
    let repo = transformer_repo(model);
    info!("Downloading {repo} from HuggingFace...");

    for &(filename, url_path) in TRANSFORMER_FILES {
        let dest = model_dir.join(filename);
        if dest.exists() {
            info!("File already exists: {filename}");
            continue;
        }
        let url = format!("{HF_BASE}/{repo}/resolve/main/{url_path}");
        download_file(&dest, &url, model)?;
        info!("Downloaded {filename}");
    }

    Ok(model_dir)
}

// ── HTTP ─────────────────────────────────────────────────────────────

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download `url` to `dest` with a progress bar.
///
/// The body streams into a `.part` file that is renamed on success. A 401 or
/// 404 response means the model does not exist.
fn download_file(dest: &Path, url: &str, model: &str) -> Result<(), EmbedderError> {
    let mut resp = reqwest::blocking::get(url)
        .map_err(|e| EmbedderError::Download(format!("HTTP request failed: {url}: {e}")))?;

    match resp.status() {
        StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => {
            return Err(EmbedderError::UnknownModel(model.to_string()));
        }
        status if !status.is_success() => {
            return Err(EmbedderError::Download(format!("bad status: {status} for {url}")));
        }
        _ => {}
    }

    let total = resp.content_length().unwrap_or(0);
    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    } else {
        ProgressBar::new_spinner()
    };

    let part = part_path(dest);
    let file = fs::File::create(&part)?;
    let mut writer = pb.wrap_write(BufWriter::new(file));
    resp.copy_to(&mut writer)
        .map_err(|e| EmbedderError::Download(format!("failed to read {url}: {e}")))?;
    writer.flush()?;
    drop(writer);
    pb.finish_and_clear();

    fs::rename(&part, dest)?;
    Ok(())
}
