use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kernforge::executor::ExecutionStrategy;
use kernforge::jit::{BaseFunction, FunctionInfo, ParamMap, PeFunction};
use kernforge::kernels::global_registry;
use kernforge::logging::init_logging_from_env;
use kernforge::tensor::{Place, Tensor, TensorLiteral};

#[derive(Parser, Debug)]
#[command(name = "kernforge-cli", version)]
#[command(about = "Inspect registered kernels and run serialized functions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered kernel keys
    Kernels {
        /// Only show kernels for this operator
        #[arg(long)]
        op: Option<String>,
    },
    /// Run a function stored as JSON against JSON tensor literals
    Run {
        /// FunctionInfo JSON file
        #[arg(long)]
        function: PathBuf,
        /// JSON array of tensor literals, one per declared input
        #[arg(long)]
        inputs: PathBuf,
        /// JSON object mapping parameter names to tensor literals
        #[arg(long)]
        params: Option<PathBuf>,
        /// Device placement: cpu, gpu:N or kps:N
        #[arg(long, default_value = "cpu")]
        place: String,
        /// Run nodes one at a time on the calling thread
        #[arg(long)]
        sequential: bool,
    },
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = init_logging_from_env() {
        eprintln!("warning: logging not initialized: {}", e);
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Kernels { op } => list_kernels(op.as_deref()),
        Commands::Run {
            function,
            inputs,
            params,
            place,
            sequential,
        } => run_function(function, inputs, params, &place, sequential),
    }
}

fn list_kernels(op: Option<&str>) -> anyhow::Result<()> {
    let registry = global_registry();
    let keys = match op {
        Some(op) => registry.kernels_for(op),
        None => registry.keys(),
    };
    if keys.is_empty() {
        let suffix = op.map(|o| format!(" for '{}'", o)).unwrap_or_default();
        anyhow::bail!("no kernels registered{}", suffix);
    }
    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

fn run_function(
    function: PathBuf,
    inputs: PathBuf,
    params: Option<PathBuf>,
    place: &str,
    sequential: bool,
) -> anyhow::Result<()> {
    let place: Place = place.parse()?;
    let info = FunctionInfo::from_file(&function)
        .with_context(|| format!("loading function from {}", function.display()))?;

    let literals: Vec<TensorLiteral> = read_json(&inputs)?;
    let tensors = literals
        .iter()
        .map(|lit| {
            let dense = lit.to_dense(place)?;
            Ok(match &lit.name {
                Some(name) => Tensor::new(dense).with_name(name.clone()),
                None => Tensor::new(dense),
            })
        })
        .collect::<kernforge::ForgeResult<Vec<_>>>()?;

    let mut param_map = ParamMap::new();
    if let Some(path) = params {
        let literals: std::collections::BTreeMap<String, TensorLiteral> = read_json(&path)?;
        for (name, lit) in literals {
            param_map.insert(name, Arc::new(lit.to_dense(place)?));
        }
    }

    let strategy = if sequential {
        ExecutionStrategy::sequential()
    } else {
        ExecutionStrategy::from_env()
    };
    let mut func = PeFunction::new(Arc::new(info), &param_map, place)?.with_strategy(strategy);
    let outputs = func.call(&tensors)?;

    let rendered = outputs
        .iter()
        .map(|t| TensorLiteral::from_dense(t.name().map(str::to_string), t.dense()))
        .collect::<kernforge::ForgeResult<Vec<_>>>()?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
