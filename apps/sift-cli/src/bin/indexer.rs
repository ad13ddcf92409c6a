use std::{env, fs, path::PathBuf};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use sift_core::config::{expand_path, Config};
use sift_core::types::FieldMapping;
use sift_text::TextIndex;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))).with_writer(std::io::stderr).init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None; let mut index_dir = None; let mut name = None; let mut mapping_file = None;
    let mut i = 0; while i < args.len() { match args[i].as_str() {
        flag @ ("--index" | "--name" | "--mapping") => {
            let Some(value) = args.get(i + 1) else { eprintln!("Error: {} requires a value", flag); std::process::exit(1) };
            match flag { "--index" => index_dir = Some(expand_path(value)), "--name" => name = Some(value.clone()), _ => mapping_file = Some(expand_path(value)) }
            i += 1;
        }
        _ if !args[i].starts_with('-') => data_dir = Some(expand_path(&args[i])), other => { eprintln!("Error: unknown flag {}", other); std::process::exit(1); } } i += 1; }
    let data_dir = match data_dir { Some(dir) => dir, None => expand_path(config.get_or("data.raw_json_dir", "../dev_data/json".to_string())?) };
    let index_dir = match index_dir { Some(dir) => dir, None => expand_path(config.get_or("data.index_dir", "../dev_data/indexes/sift".to_string())?) };
    let name = match name { Some(name) => name, None => config.get_or("data.index_name", "documents".to_string())? };
    let mapping: FieldMapping = match mapping_file { Some(path) => serde_json::from_str(&fs::read_to_string(&path)?)?, None => config.get_or("mapping", FieldMapping::new())? };

    println!("Sift Indexer\n============");
    println!("Data directory: {}", data_dir.display()); println!("Index directory: {}", index_dir.display()); println!("Mapped fields: {}", mapping.len());
    let files: Vec<PathBuf> = WalkDir::new(&data_dir).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()).filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json")).map(|e| e.into_path()).collect();
    let index = TextIndex::create_in_dir(&name, index_dir, mapping)?;
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?.progress_chars("#>-"));
    let mut indexed = 0usize; let mut skipped = 0usize;
    for path in &files {
        pb.set_message(path.file_name().and_then(|s| s.to_str()).unwrap_or_default().to_string());
        let body: Value = match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from)) {
            Ok(body) => body, Err(e) => { tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document"); skipped += 1; pb.inc(1); continue; } };
        let id = body.get("_id").and_then(|v| v.as_str()).map(str::to_string).or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string)).unwrap_or_default();
        match index.index_document(&id, &body) { Ok(()) => indexed += 1, Err(e) => { tracing::warn!(path = %path.display(), error = %e, "skipping document"); skipped += 1; } }
        pb.inc(1);
    }
    index.commit()?;
    pb.finish_with_message("✅ indexing completed!");
    println!("📊 Indexed {} documents into '{}' ({} skipped)", indexed, name, skipped);
    println!("\n💡 To search, use: cargo run --bin sift-search '{{\"search_type\":\"matchall\"}}'");
    Ok(())
}
