use std::{env, fs};
use sift_core::config::{expand_path, Config, SearchSettings};
use sift_core::query::QueryDescriptor;
use sift_text::{SearchService, TextIndex};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))).with_writer(std::io::stderr).init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query_json|@file> [--index DIR] [--name NAME]", args[0]);
        eprintln!("Example: {} '{{\"search_type\":\"match\",\"query\":{{\"term\":\"fox\"}}}}'", args[0]);
        std::process::exit(1);
    }
    let config = Config::load()?;
    let raw = match args[1].strip_prefix('@') { Some(path) => fs::read_to_string(expand_path(path))?, None => args[1].clone() };
    let query: QueryDescriptor = serde_json::from_str(&raw)?;
    let flag = |name: &str| args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).cloned();
    let index_dir = match flag("--index") { Some(dir) => expand_path(dir), None => expand_path(config.get_or("data.index_dir", "../dev_data/indexes/sift".to_string())?) };
    let name = match flag("--name") { Some(name) => name, None => config.get_or("data.index_name", "documents".to_string())? };

    let index = TextIndex::open_in_dir(&name, index_dir)?;
    let service = SearchService::new(index, SearchSettings::from_config(&config)?);
    match service.search(&query) {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.response)?);
            for warning in &outcome.warnings { eprintln!("⚠️  {}", warning); }
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.response)?);
            eprintln!("Error: {}", failure);
            std::process::exit(2);
        }
    }
}
