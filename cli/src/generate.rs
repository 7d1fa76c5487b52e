//! The generate subcommand: envelopes in, JSON file tree out

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use scripture_api_backend::api::GeneratorOptions;
use scripture_api_backend::dataset::{DatasetBuilder, ProcessingStats};
use scripture_api_backend::export::generate_api_files;
use scripture_api_backend::types::InputFile;

pub struct GenerateSummary {
    pub stats: ProcessingStats,
    pub files_written: usize,
}

/// Read every `*.json` envelope under `input_dir`, run the pipeline, and
/// write the generated tree beneath `output_dir`.
pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    use_common_name: bool,
    strict: bool,
) -> Result<GenerateSummary> {
    let mut builder = DatasetBuilder::new().with_strict(strict);

    // Sorted filename order keeps the run deterministic.
    let mut entries: Vec<PathBuf> = fs::read_dir(input_dir)
        .with_context(|| format!("reading input directory {:?}", input_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    entries.sort();

    if entries.is_empty() {
        anyhow::bail!("no *.json input files found in {:?}", input_dir);
    }
    tracing::info!("found {} input envelope files", entries.len());

    for path in &entries {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let input: InputFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing input envelope {:?}", path))?;
        builder
            .add_file(&input)
            .with_context(|| format!("processing {:?}", path))?;
    }

    let (dataset, stats) = builder.build();
    let options = GeneratorOptions { use_common_name };
    let files = generate_api_files(&dataset, &options)?;

    for file in &files {
        let relative = file.path.trim_start_matches('/');
        let target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {:?}", parent))?;
        }
        let mut json = serde_json::to_string_pretty(&file.content)
            .with_context(|| format!("serializing {}", file.path))?;
        json.push('\n');
        fs::write(&target, json).with_context(|| format!("writing {:?}", target))?;
    }

    Ok(GenerateSummary {
        stats,
        files_written: files.len(),
    })
}
