use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tilecomp::{CompositorConfig, ExecutionSystem, MemoryBuffer, NodeGraphDesc, NodeRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tilecomp", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a node graph and write its outputs as PNG.
    Render(RenderArgs),
    /// Print the execution groups and chunk grid a node graph compiles to.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct GraphArgs {
    /// Node graph JSON.
    #[arg(long)]
    graph: PathBuf,

    /// Compositor config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Override chunk edge length.
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Override render size as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_size)]
    size: Option<(u32, u32)>,

    /// Editing mode: viewer outputs are active too.
    #[arg(long, default_value_t = false)]
    viewers: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    graph: GraphArgs,

    /// Output PNG path. With several outputs the label is appended to the file stem.
    #[arg(long)]
    out: PathBuf,

    /// Only write the output with this label.
    #[arg(long)]
    output: Option<String>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[command(flatten)]
    graph: GraphArgs,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok((w, h))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_system(args: &GraphArgs) -> anyhow::Result<ExecutionSystem> {
    let mut config = match &args.config {
        Some(path) => CompositorConfig::from_path(path)?,
        None => CompositorConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = Some(threads);
    }
    if let Some(size) = args.chunk_size {
        config.chunk_size = size;
        config.auto_chunk_size = false;
    }
    if let Some((w, h)) = args.size {
        config.render_size = tilecomp::Resolution::new(w, h);
    }

    let desc = NodeGraphDesc::from_path(&args.graph)?;
    let base_dir = args.graph.parent().unwrap_or_else(|| Path::new("."));
    let built = NodeRegistry::with_builtins()
        .build(&desc, Some(base_dir))
        .with_context(|| format!("build node graph '{}'", args.graph.display()))?;
    Ok(ExecutionSystem::new(built.graph, !args.viewers, &config)?)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut system = load_system(&args.graph)?;
    let result = system.execute()?;

    let selected: Vec<(&String, &MemoryBuffer)> = result
        .outputs
        .iter()
        .filter(|(name, _)| args.output.as_ref().is_none_or(|want| want == *name))
        .collect();
    if selected.is_empty() {
        anyhow::bail!("graph produced no matching outputs");
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let single = selected.len() == 1;
    for (name, buffer) in selected {
        let path = if single {
            args.out.clone()
        } else {
            labelled_path(&args.out, name)
        };
        write_png(&path, buffer)?;
        eprintln!("wrote {} ({name})", path.display());
    }
    eprintln!(
        "{} chunks in {:.1} ms",
        result.stats.chunks_finished,
        result.stats.elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let system = load_system(&args.graph)?;
    let graph = system.graph();
    println!("operations: {}", graph.len());
    for &gid in system.execution_order() {
        let Some(group) = system.group(gid) else {
            continue;
        };
        let (cx, cy) = group.chunk_grid();
        let root = graph.operation(group.root()).map(|op| op.name()).unwrap_or("?");
        println!(
            "group {gid}: root {} ({root}) {} chunk {} grid {cx}x{cy} priority {}{}",
            group.root(),
            group.resolution(),
            group.chunk_size(),
            group.priority(),
            group
                .output_name()
                .map(|n| format!(" output '{n}'"))
                .unwrap_or_default()
        );
        for op in group.operations() {
            let name = graph.operation(*op).map(|o| o.name()).unwrap_or("?");
            println!("  {op} {name} {}", graph.resolution(*op));
        }
    }
    Ok(())
}

fn labelled_path(out: &Path, label: &str) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    let safe: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    out.with_file_name(format!("{stem}-{safe}.png"))
}

fn write_png(path: &Path, buffer: &MemoryBuffer) -> anyhow::Result<()> {
    let color = if buffer.data_type() == tilecomp::DataType::Color {
        buffer.clone()
    } else {
        let mut c = MemoryBuffer::new(tilecomp::DataType::Color, buffer.rect());
        c.copy_content_from(buffer);
        c
    };
    let bytes: Vec<u8> = color
        .data()
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    image::save_buffer_with_format(
        path,
        &bytes,
        color.width(),
        color.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}
