use clap::Parser;
use log::error;
use neurosel_core::cli::{InspectCli, OutputFormat};
use neurosel_core::{
    parse_flat_lines, Modality, Result, SelectionConfig, VolumeInspection, VolumeInspector,
};
use std::process;

fn main() {
    let cli = InspectCli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let modality = match cli.modality.as_deref().map(|m| (m, Modality::parse(m))) {
        None => None,
        Some((_, Some(m))) => Some(m),
        Some((raw, None)) => {
            eprintln!("Error: unknown modality '{}'", raw);
            process::exit(2);
        }
    };

    let inspection = match load_config(&cli).and_then(|config| {
        VolumeInspector::new(config)?.inspect(&cli.file, modality)
    }) {
        Ok(inspection) => inspection,
        Err(e) => {
            error!("Failed to inspect {}: {}", cli.file.display(), e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match cli.format {
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match serde_json::to_string_pretty(&inspection) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                eprintln!("Error: JSON output requires the 'json' feature");
                process::exit(1);
            }
        }
        OutputFormat::Text | OutputFormat::Record => print!("{}", render(&inspection)),
    }
}

fn load_config(cli: &InspectCli) -> Result<SelectionConfig> {
    match &cli.config {
        Some(path) => SelectionConfig::from_flat_file(path),
        None => SelectionConfig::from_env(),
    }
}

fn render(inspection: &VolumeInspection) -> String {
    let c = &inspection.candidate;
    let mut out = String::new();
    out.push_str(&format!("File:          {}\n", c.path.display()));
    out.push_str(&format!("Modality:      {}\n", c.modality));
    out.push_str(&format!("Dimensions:    {}\n", c.dims));
    out.push_str(&format!("Spacing (mm):  {}\n", c.spacing));
    out.push_str(&format!("Provenance:    {}\n", c.provenance));
    if let Some(image_type) = &c.image_type {
        out.push_str(&format!("Image Type:    {}\n", image_type));
    }
    if !c.series_description.is_empty() {
        out.push_str(&format!("Series:        {}\n", c.series_description));
    }
    out.push_str(&format!("Scanner:       {}\n", c.scanner));
    out.push_str(&format!("Metadata:      {:?}\n", c.metadata_source));
    out.push_str(&format!("3D isotropic:  {}\n", inspection.is_3d_isotropic));
    out.push_str(&format!("Score:         {}\n", inspection.score));
    out
}
