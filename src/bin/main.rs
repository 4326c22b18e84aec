//! Mesh Splitter CLI
//!
//! Split Wavefront OBJ meshes into per-(group, material) partition files.

use clap::{Parser, Subcommand};
use mesh_splitter::{run_pipeline, ConversionUnit, SplitConfig, Splitter};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "mesh-splitter")]
#[command(author, version, about = "Split OBJ meshes into per-material partitions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a single mesh file
    Split {
        /// Input OBJ file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for partition files
        #[arg(short, long)]
        out_dir: PathBuf,

        /// JSON file with the known material names for this mesh
        /// (an array of strings)
        #[arg(short, long)]
        materials: Option<PathBuf>,

        /// Namespace prefix for resolved material identifiers
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Fallback key for empty usemtl tokens (default: input file stem)
        #[arg(long)]
        fallback_key: Option<String>,

        /// Buffered lines per partition before flushing to disk
        #[arg(long, default_value_t = mesh_splitter::DEFAULT_FLUSH_WATERMARK)]
        flush_watermark: usize,

        /// Write the partition-to-material table to this file instead of
        /// stdout
        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Run a pipeline manifest of conversion units concurrently
    Pipeline {
        /// JSON manifest (an array of conversion units)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,

        /// Write the merged aggregate to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show partition statistics for a mesh without writing output
    Info {
        /// Input OBJ file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> mesh_splitter::Result<()> {
    match cli.command {
        Commands::Split {
            input,
            out_dir,
            materials,
            namespace,
            fallback_key,
            flush_watermark,
            table,
        } => {
            let known: Vec<String> = match materials {
                Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
                None => Vec::new(),
            };
            let fallback_key = fallback_key.unwrap_or_else(|| file_stem(&input));
            fs::create_dir_all(&out_dir)?;
            let config = SplitConfig::new(&out_dir, fallback_key)
                .with_materials(known)
                .with_namespace(namespace)
                .with_flush_watermark(flush_watermark);
            let output = Splitter::new(config).split_file(&input)?;

            eprintln!(
                "wrote {} partition(s) to {}",
                output.files.len(),
                out_dir.display()
            );
            let json = serde_json::to_string_pretty(&output.materials)?;
            match table {
                Some(path) => fs::write(path, json)?,
                None => println!("{json}"),
            }
        }

        Commands::Pipeline {
            manifest,
            jobs,
            output,
        } => {
            let units: Vec<ConversionUnit> = serde_json::from_str(&fs::read_to_string(manifest)?)?;
            let aggregate = run_pipeline(&units, jobs)?;
            eprintln!(
                "converted {} unit(s), {} shape(s)",
                units.len(),
                aggregate.shapes.len()
            );
            let json = serde_json::to_string_pretty(&aggregate)?;
            match output {
                Some(path) => fs::write(path, json)?,
                None => println!("{json}"),
            }
        }

        Commands::Info { input } => {
            let reader = BufReader::new(fs::File::open(&input)?);
            let mut vertices = 0u64;
            let mut texcoords = 0u64;
            let mut normals = 0u64;
            let mut faces = 0u64;
            let mut groups = Vec::new();
            for line in reader.lines() {
                let line = line?;
                match mesh_splitter::classify(line.trim_end_matches('\r')) {
                    mesh_splitter::Directive::Vertex(_) => vertices += 1,
                    mesh_splitter::Directive::Texcoord(_) => texcoords += 1,
                    mesh_splitter::Directive::Normal(_) => normals += 1,
                    mesh_splitter::Directive::Face(_) => faces += 1,
                    mesh_splitter::Directive::Group(name) => {
                        if groups.last().map(String::as_str) != Some(name) {
                            groups.push(name.to_string());
                        }
                    }
                    _ => {}
                }
            }
            println!("{}", input.display());
            println!("  vertices:  {vertices}");
            println!("  texcoords: {texcoords}");
            println!("  normals:   {normals}");
            println!("  faces:     {faces}");
            println!("  groups:    {}", groups.len());
            for group in groups {
                println!("    {group}");
            }
        }
    }
    Ok(())
}

fn file_stem(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string())
}
