use adom::{Artifact, CompileOptions, Compiler, DiskFs, RenderOptions, Value};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "adom")]
#[command(about = "adom - HTML templates rendered on the server, synced in the browser")]
struct Cli {
    /// Log to stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a .adom file to stdout
    Render {
        file: PathBuf,

        /// JSON file with the render input
        #[arg(long)]
        data: Option<PathBuf>,

        /// Server function names available to handlers
        #[arg(long = "action")]
        actions: Vec<String>,
    },

    /// Compile a .adom file to a cached artifact
    Compile {
        file: PathBuf,

        /// Artifact path, stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long = "action")]
        actions: Vec<String>,
    },

    /// Render a cached artifact to stdout
    Replay {
        cache: PathBuf,

        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Render every .adom file under a directory to a sibling .html file
    Build {
        dir: PathBuf,

        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render { file, data, actions } => {
            let input = load_data(data.as_deref());
            let artifact = compile(&file, actions);
            let html = render(&artifact, &input);
            print!("{}", html);
        }
        Commands::Compile { file, output, actions } => {
            let artifact = compile(&file, actions);
            let cache = artifact.to_cache().unwrap_or_else(|e| fail(&e.to_string()));
            match output {
                Some(path) => {
                    write_file(&path, &cache);
                    print_generated(&path.display().to_string());
                }
                None => println!("{}", cache),
            }
        }
        Commands::Replay { cache, data } => {
            let input = load_data(data.as_deref());
            let text = read_file(&cache);
            let artifact = Artifact::from_cache(&text).unwrap_or_else(|e| fail(&e.to_string()));
            let html = render(&artifact, &input);
            print!("{}", html);
        }
        Commands::Build { dir, data } => {
            let input = load_data(data.as_deref());
            build_directory(&dir, &input);
        }
    }

    let _ = io::stdout().flush();
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn compile(path: &Path, actions: Vec<String>) -> Artifact {
    let options = CompileOptions {
        actions,
        ..CompileOptions::default()
    };
    match Compiler::new(DiskFs, options).compile(path) {
        Ok(artifact) => artifact,
        Err(e) => {
            if io::stderr().is_terminal() {
                eprintln!("{}", e.render_color());
            } else {
                eprintln!("{}", e.render());
            }
            std::process::exit(1);
        }
    }
}

fn render(artifact: &Artifact, input: &Value) -> String {
    match adom::render(artifact, input, &RenderOptions::default()) {
        Ok(html) => html,
        Err(e) => {
            if io::stderr().is_terminal() {
                eprintln!("{}", e.render_color(&artifact.sources));
            } else {
                eprintln!("{}", e.render(&artifact.sources));
            }
            std::process::exit(1);
        }
    }
}

fn load_data(path: Option<&Path>) -> Value {
    let Some(path) = path else {
        return Value::empty_object();
    };
    let text = read_file(path);
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Value::from(json),
        Err(e) => fail(&format!("{} is not valid JSON: {}", path.display(), e)),
    }
}

fn build_directory(dir: &Path, input: &Value) {
    if !dir.is_dir() {
        fail(&format!("{} is not a directory", dir.display()));
    }

    let start = Instant::now();
    let mut file_count = 0;
    let mut failed = 0;

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "adom"))
    {
        let path = entry.path();
        match build_file(path, input) {
            Ok(output) => {
                file_count += 1;
                print_generated(&output.display().to_string());
            }
            Err(report) => {
                failed += 1;
                eprintln!("{}", report);
            }
        }
    }

    if file_count == 0 && failed == 0 {
        fail(&format!("No .adom files found in {}", dir.display()));
    }

    print_summary(file_count, start.elapsed());
    if failed > 0 {
        std::process::exit(1);
    }
}

fn build_file(path: &Path, input: &Value) -> Result<PathBuf, String> {
    let color = io::stderr().is_terminal();
    let artifact = Compiler::new(DiskFs, CompileOptions::default())
        .compile(path)
        .map_err(|e| if color { e.render_color() } else { e.render() })?;
    let html = adom::render(&artifact, input, &RenderOptions::default()).map_err(|e| {
        if color {
            e.render_color(&artifact.sources)
        } else {
            e.render(&artifact.sources)
        }
    })?;

    let output = path.with_extension("html");
    fs::write(&output, html).map_err(|e| format!("{}: {}", output.display(), e))?;
    Ok(output)
}

fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| fail(&format!("{}: {}", path.display(), e)))
}

fn write_file(path: &Path, text: &str) {
    if let Err(e) = fs::write(path, text) {
        fail(&format!("{}: {}", path.display(), e));
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn print_generated(path: &str) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn print_summary(count: usize, elapsed: std::time::Duration) {
    let is_tty = io::stderr().is_terminal();
    let time_str = format_duration(elapsed);
    let files_word = if count == 1 { "file" } else { "files" };

    if is_tty {
        eprintln!("\n\x1b[1m✨ Rendered {} {} in {}\x1b[0m", count, files_word, time_str);
    } else {
        eprintln!("\n✨ Rendered {} {} in {}", count, files_word, time_str);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
