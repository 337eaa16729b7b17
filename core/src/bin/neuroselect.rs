use clap::Parser;
use log::{error, info, warn};
use neurosel_core::cli::{Cli, OutputFormat};
use neurosel_core::{
    parse_flat_lines, BatchPresenter, DecisionRecord, DecisionStore, InteractivePresenter,
    Modality, Result, SelectionConfig, SelectionEngine, SelectionMode, SelectionPresenter,
    SubjectSelection, TextReport,
};
use std::path::Path;
use std::process;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    // Verify directory exists
    if !cli.directory.is_dir() {
        eprintln!("Error: {} is not a directory", cli.directory.display());
        process::exit(1);
    }

    let subject = match subject_id(&cli) {
        Some(id) => id,
        None => {
            eprintln!("Error: cannot derive a subject id; pass --subject");
            process::exit(1);
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    if !cli.interactive
        && Modality::DETECTION_ORDER
            .iter()
            .any(|&m| config.mode_for(m) == SelectionMode::Interactive)
    {
        warn!("Interactive selection mode without --interactive; taking top candidates");
    }

    let mut presenter: Box<dyn SelectionPresenter> = if cli.interactive {
        Box::new(InteractivePresenter::stdio())
    } else {
        Box::new(BatchPresenter)
    };

    info!("Processing subject {} in {}", subject, cli.directory.display());
    let engine = match SelectionEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let selection = match run(&engine, &cli.directory, &subject, cli.output.as_deref(), presenter.as_mut()) {
        Ok(selection) => selection,
        Err(e) => {
            error!("Selection failed for {}: {}", subject, e);
            eprintln!("Error: {}", e);
            process::exit(if e.is_fatal_to_subject() { 3 } else { 1 });
        }
    };

    output_selection(&selection, cli.format);
}

fn setup_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
}

fn subject_id(cli: &Cli) -> Option<String> {
    cli.subject.clone().or_else(|| {
        cli.directory
            .canonicalize()
            .ok()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    })
}

/// Config file first, then environment, then command-line modes
fn load_config(cli: &Cli) -> Result<SelectionConfig> {
    let mut pairs = Vec::new();
    if let Some(path) = &cli.config {
        pairs.extend(parse_flat_lines(&std::fs::read_to_string(path)?));
    }
    pairs.extend(std::env::vars().filter(|(key, _)| SelectionConfig::is_known_key(key)));

    let mut config = SelectionConfig::from_pairs(pairs)?;
    if let Some(mode) = cli.t1_mode {
        config = config.with_mode(Modality::T1, mode);
    }
    if let Some(mode) = cli.flair_mode {
        config = config.with_mode(Modality::Flair, mode);
    }
    Ok(config)
}

fn run(
    engine: &SelectionEngine,
    dir: &Path,
    subject: &str,
    output: Option<&Path>,
    presenter: &mut dyn SelectionPresenter,
) -> Result<SubjectSelection> {
    match output {
        Some(root) => {
            let mut store = DecisionStore::new(root);
            let run = engine.run(subject, dir, presenter, &mut store)?;
            info!("Decision record written to {}", run.record_path.display());
            Ok(run.selection)
        }
        None => {
            let catalog = engine.catalog(dir)?;
            engine.evaluate(subject, &catalog, presenter)
        }
    }
}

fn output_selection(selection: &SubjectSelection, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TextReport::new(selection));
        }
        OutputFormat::Record => match DecisionRecord::from_selection(selection) {
            Ok(record) => print!("{}", record),
            Err(e) => {
                error!("Failed to build decision record: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match serde_json::to_string_pretty(selection) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize to JSON: {}", e);
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(1);
            }
        }
    }
}
