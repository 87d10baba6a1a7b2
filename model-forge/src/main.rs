use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::glob;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use model_forge::builder::ContainerSpec;
use model_forge::diff::{generate_unified_diff, short_hash, DiffStats};
use model_forge::editor::{write_atomic, ClassEditor};
use model_forge::model::{model_spec, AccessorStyle, ModelField};
use model_forge::operations::{BatchSpec, InspectResult, Operation};
use model_forge::path_resolver::PathResolver;

#[derive(Parser)]
#[command(name = "model-forge")]
#[command(about = "Format-preserving scaffolding for PHP model classes", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root holding composer.json (default: $MODEL_FORGE_ROOT, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Default, global = true)]
    format: OutputFormat,

    /// Log engine decisions to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Default,
    Diff,
    Summary,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a batch of declaration requests (JSON or YAML) to one class
    Apply {
        /// Fully-qualified class name (overrides the batch file's `class`)
        #[arg(short, long)]
        class: Option<String>,

        /// Batch file with an `operations` list
        #[arg(short, long)]
        batch: PathBuf,

        /// Parent class used when the class has to be created
        #[arg(long)]
        parent: Option<String>,

        /// Interfaces used when the class has to be created (comma separated)
        #[arg(long, value_delimiter = ',')]
        implements: Vec<String>,

        /// Imports to add (can be used multiple times)
        #[arg(long = "use")]
        imports: Vec<String>,

        /// Output path (if specified, writes to new file instead of modifying in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Apply changes (default is dry-run)
        #[arg(long)]
        apply: bool,
    },

    /// Add a column to a model class (idempotent - unchanged declarations are skipped)
    AddField {
        /// Fully-qualified model class name (e.g., "App\Models\Post")
        #[arg(short, long)]
        class: String,

        /// Column name (e.g., "user_name")
        #[arg(short, long)]
        name: String,

        /// Declare a FIELD_* constant and go through the attribute bag
        #[arg(long = "const")]
        use_const: bool,

        /// Column type recorded in the @Column doc
        #[arg(long = "type", default_value = "string")]
        field_type: String,

        /// Column length
        #[arg(long)]
        length: Option<u32>,

        /// Column accepts NULL
        #[arg(long)]
        nullable: bool,

        /// Column default value
        #[arg(long)]
        default: Option<String>,

        /// Free-form column comment
        #[arg(long)]
        comment: Option<String>,

        /// Skip the getter and setter
        #[arg(long)]
        no_accessors: bool,

        /// Output path (if specified, writes to new file instead of modifying in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Apply changes (default is dry-run)
        #[arg(long)]
        apply: bool,
    },

    /// Print the file a class name maps to
    Resolve {
        /// Fully-qualified class name
        #[arg(short, long)]
        class: String,
    },

    /// List the class and members of PHP files
    Inspect {
        /// PHP files or directories (supports multiple paths and glob patterns)
        #[arg(short, long, num_args = 1..)]
        paths: Vec<PathBuf>,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
}

/// Where and how the rendered class is reported or written.
struct EditTarget<'a> {
    path: &'a Path,
    output: Option<&'a Path>,
    apply: bool,
    format: OutputFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let root = project_root(cli.root.as_deref())?;

    match cli.command {
        Commands::Apply {
            class,
            batch,
            parent,
            implements,
            imports,
            output,
            apply,
        } => {
            let plan = load_batch(&batch)?;
            let class = class
                .or_else(|| plan.class.clone())
                .context("No class given (use --class or set `class` in the batch file)")?;

            let mut container = ContainerSpec::for_class(&class);
            container.parent = parent.or_else(|| plan.parent.clone());
            container = container.with_implements(if implements.is_empty() {
                plan.implements.clone()
            } else {
                implements
            });
            for import in plan.imports.iter().chain(&imports) {
                container = container.with_import(import.clone());
            }

            let resolver = PathResolver::from_composer(&root)?;
            let path = resolver.resolve(&class)?;
            let target = EditTarget {
                path: &path,
                output: output.as_deref(),
                apply,
                format: cli.format,
            };
            run_edit(&target, &container, &plan.operations)?;
        }

        Commands::AddField {
            class,
            name,
            use_const,
            field_type,
            length,
            nullable,
            default,
            comment,
            no_accessors,
            output,
            apply,
        } => {
            let field = ModelField {
                name,
                field_type,
                length,
                nullable,
                default,
                comment,
            };
            let style = if use_const {
                AccessorStyle::Constant
            } else {
                AccessorStyle::Property
            };
            let operations = field.operations(style, !no_accessors);
            if operations.is_empty() {
                println!("Nothing to add for '{}' (plain mode without accessors)", field.name);
                return Ok(());
            }

            let resolver = PathResolver::from_composer(&root)?;
            let path = resolver.resolve(&class)?;
            let target = EditTarget {
                path: &path,
                output: output.as_deref(),
                apply,
                format: cli.format,
            };
            run_edit(&target, &model_spec(&class), &operations)?;
        }

        Commands::Resolve { class } => {
            let resolver = PathResolver::from_composer(&root)?;
            let path = resolver.resolve(&class)?;
            println!("{}", path.display());
        }

        Commands::Inspect { paths, json } => {
            let files = collect_php_files(&paths)?;
            let mut results = Vec::new();
            for file in files {
                let editor = ClassEditor::from_path(&file)
                    .with_context(|| format!("Failed to parse {}", file.display()))?;
                results.push(editor.inspect(&file.display().to_string()));
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    print_inspect(result);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn project_root(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = std::env::var_os("MODEL_FORGE_ROOT").filter(|r| !r.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    std::env::current_dir().context("Failed to determine the current directory")
}

fn load_batch(path: &Path) -> Result<BatchSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    // Auto-detect format based on file extension
    let ext = path.extension().and_then(|s| s.to_str());
    let batch = if matches!(ext, Some("yaml") | Some("yml")) {
        serde_yaml::from_str(&content).context("Failed to parse batch YAML")?
    } else {
        // Try JSON first, fall back to YAML if JSON fails
        serde_json::from_str(&content)
            .or_else(|_| serde_yaml::from_str(&content))
            .context("Failed to parse batch file (tried both JSON and YAML)")?
    };
    Ok(batch)
}

/// Loads (or starts) the class file, applies every operation in memory and
/// writes once, only when all of them succeeded.
fn run_edit(target: &EditTarget<'_>, container: &ContainerSpec, operations: &[Operation]) -> Result<()> {
    let mut editor = ClassEditor::from_path(target.path)
        .with_context(|| format!("Failed to load {}", target.path.display()))?;
    editor
        .ensure_container(container)
        .with_context(|| format!("Failed to prepare class {} in {}", container.name, target.path.display()))?;

    let mut outcomes = Vec::new();
    for op in operations {
        let changed = editor
            .apply_operation(op)
            .with_context(|| format!("Failed to add {}", op.describe()))?;
        outcomes.push((op.describe(), changed));
    }

    let old_content = editor.original_source();
    let new_content = editor.render();
    let write_path = target.output.unwrap_or(target.path);

    if new_content == old_content && target.output.is_none() {
        println!("No changes needed: {} is up to date", target.path.display());
        return Ok(());
    }

    let (diff, stats) = generate_unified_diff(write_path, old_content, &new_content, 3);
    match target.format {
        OutputFormat::Diff => {
            print!("{}", diff);
            println!("{}", stats);
        }
        OutputFormat::Summary => {
            println!("{}:", write_path.display());
            for (label, changed) in &outcomes {
                println!("  {} {}", if *changed { "+" } else { "=" }, label);
            }
            print_stats(&stats);
        }
        OutputFormat::Default => {}
    }

    if target.apply {
        match target.output {
            Some(output) => write_atomic(output, &new_content)?,
            None => editor.save()?,
        }
        if target.format == OutputFormat::Default {
            if old_content.is_empty() {
                println!("✓ Created: {} ({})", write_path.display(), short_hash(&new_content));
            } else {
                println!(
                    "✓ Modified: {} ({} -> {})",
                    write_path.display(),
                    short_hash(old_content),
                    short_hash(&new_content)
                );
            }
        }
    } else if target.format == OutputFormat::Default {
        if target.output.is_some() {
            println!("Would write to: {}", write_path.display());
        } else {
            println!("Would modify: {}", write_path.display());
        }
        println!("\n🔍 Dry run complete. Use --apply to make changes.");
    }

    Ok(())
}

fn print_stats(stats: &DiffStats) {
    if stats.is_empty() {
        println!("No line changes");
    } else {
        println!("{}", stats);
    }
}

fn print_inspect(result: &InspectResult) {
    match &result.class {
        Some(class) => {
            let fqcn = match &result.namespace {
                Some(ns) => format!("{}\\{}", ns, class),
                None => class.clone(),
            };
            match &result.parent {
                Some(parent) => println!("{}: {} extends {}", result.file_path, fqcn, parent),
                None => println!("{}: {}", result.file_path, fqcn),
            }
        }
        None => println!("{}: no class", result.file_path),
    }
    for member in &result.members {
        println!(
            "  {}:{}  {} {}",
            member.line, member.column, member.kind, member.name
        );
    }
}

fn collect_php_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let is_php = |p: &Path| p.extension().and_then(|s| s.to_str()) == Some("php");

    for path in paths {
        let path_str = path.to_string_lossy();

        // Check if path contains glob pattern characters
        if path_str.contains('*') || path_str.contains('?') || path_str.contains('[') {
            for entry in glob(&path_str).context("Failed to parse glob pattern")? {
                match entry {
                    Ok(file_path) => {
                        if file_path.is_file() && is_php(&file_path) {
                            files.push(file_path);
                        }
                    }
                    Err(e) => eprintln!("Warning: Error reading glob entry: {}", e),
                }
            }
        } else if path.is_file() {
            if is_php(path) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_php(e.path()))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }

    Ok(files)
}
