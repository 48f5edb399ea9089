use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::{Parser, ValueEnum};
use env_logger::Env;
use itertools::Itertools;
use log::{error, info, warn};
use memory_stats::memory_stats;
use pmc::{
    BuildError, BuilderOptions, ExplicitModelBuilder, ExplorationOrder, ModelType, SparseModel,
    formats::{ExportError, ParseError, lab, rew, tra},
    generator::{explicit::ExplicitGenerator, program::ProgramGenerator},
    linalg::fields::{PseudoField, float64::Float64, rational::Rational},
};
use serde::Serialize;
use thiserror::Error;

pub mod models;
use models::*;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Read model from tra file.
    #[arg(short, long, conflicts_with = "model")]
    input: Option<PathBuf>,
    /// Read the labels of the tra model from a lab file.
    #[arg(long, requires = "input")]
    labels: Option<PathBuf>,
    /// Read a state reward model of the tra model from a rew file, named after the file.
    #[arg(long, requires = "input")]
    state_rewards: Vec<PathBuf>,
    #[arg(value_enum, short, long, default_value_t = Model::Die)]
    model: Model,
    /// Parameter of the scalable models.
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(i64).range(1..))]
    size: i64,
    #[arg(value_enum, short, long, default_value_t = NumericField::Rational)]
    numeric_field: NumericField,
    /// Read the builder options from a JSON file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(value_enum, short, long)]
    exploration_order: Option<Order>,
    /// Fail on deadlock states instead of adding self-loops.
    #[arg(long)]
    dont_fix_deadlocks: bool,
    #[arg(long)]
    show_progress: bool,
    #[arg(long)]
    state_valuations: bool,
    /// Output prefix, writes tra, lab and rew files.
    #[arg(short, long)]
    output: Option<String>,
    /// Print the summary of the model as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum NumericField {
    Rational,
    F64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Order {
    Bfs,
    Dfs,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Unable to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Serialize)]
struct Summary<'m> {
    model_type: ModelType,
    states: usize,
    transitions: usize,
    choices: usize,
    initial_states: usize,
    deadlock_states: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    markovian_states: Option<usize>,
    labels: BTreeMap<&'m str, usize>,
    reward_models: Vec<&'m str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<&'m str>,
}

impl<'m> Summary<'m> {
    fn new<F: PseudoField>(model: &'m SparseModel<F>) -> Self {
        Self {
            model_type: model.model_type(),
            states: model.number_of_states(),
            transitions: model.number_of_transitions(),
            choices: model.number_of_choices(),
            initial_states: model.initial_states().count_ones(),
            deadlock_states: model.deadlock_states().count_ones(),
            markovian_states: model.markovian_states().map(|states| states.count_ones()),
            labels: model
                .labeling()
                .iter()
                .map(|(label, states)| (label, states.count_ones()))
                .collect(),
            reward_models: model.reward_models().keys().map(String::as_str).collect(),
            events: model
                .events()
                .map(|events| events.table.iter().map(|(name, _)| name).collect())
                .unwrap_or_default(),
        }
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_owned(),
        source,
    })
}

fn builder_options(args: &Args) -> Result<BuilderOptions, CliError> {
    let mut options = match &args.config {
        Some(path) => serde_json::from_str(&read(path)?)?,
        None => BuilderOptions::default(),
    };
    match args.exploration_order {
        Some(Order::Bfs) => options.exploration_order = ExplorationOrder::Bfs,
        Some(Order::Dfs) => options.exploration_order = ExplorationOrder::Dfs,
        None => {}
    }
    if args.dont_fix_deadlocks {
        options.fix_deadlocks = false;
    }
    options.show_progress |= args.show_progress;
    options.build_state_valuations |= args.state_valuations;
    Ok(options)
}

fn from_file<F: PseudoField>(
    file: &Path,
    args: &Args,
    options: BuilderOptions,
) -> Result<SparseModel<F>, CliError> {
    let mut explicit = tra::parse::<F>(&read(file)?)?;
    if let Some(path) = &args.labels {
        explicit.labels = lab::parse(&read(path)?, explicit.state_count())?;
    }
    for path in &args.state_rewards {
        let name = path
            .file_stem()
            .map_or_else(|| "rewards".to_owned(), |stem| stem.to_string_lossy().into_owned());
        let rewards = rew::parse(&read(path)?, explicit.state_count())?;
        explicit.state_rewards.insert(name, rewards);
    }
    let generator = ExplicitGenerator::new(explicit)?;
    Ok(ExplicitModelBuilder::new(generator, options).build()?)
}

fn export<F: PseudoField>(model: &SparseModel<F>, prefix: &str) -> Result<(), CliError> {
    if matches!(
        model.model_type(),
        ModelType::Dtmc | ModelType::Ctmc | ModelType::Mdp
    ) {
        let mut out = BufWriter::new(File::create(format!("{prefix}.tra"))?);
        tra::write(model, &mut out)?;
        out.flush()?;
    } else {
        warn!(
            "Transitions of a {} cannot be written as tra file.",
            model.model_type()
        );
    }

    let mut out = BufWriter::new(File::create(format!("{prefix}.lab"))?);
    lab::write(model.labeling(), &mut out)?;
    out.flush()?;

    for (name, rewards) in model.reward_models() {
        if !rewards.has_state_rewards() {
            warn!("Reward model '{name}' has no state rewards, skipping it.");
            continue;
        }
        let mut out = BufWriter::new(File::create(format!("{prefix}.{name}.rew"))?);
        rew::write(rewards, &mut out)?;
        out.flush()?;
    }
    info!("Model written to {prefix}.*");
    Ok(())
}

fn run<F: PseudoField + 'static>(args: &Args) -> Result<(), CliError> {
    let options = builder_options(args)?;
    let time_start = Instant::now();
    let model = match &args.input {
        Some(file) => from_file::<F>(file, args, options)?,
        None => {
            info!("Building model [{}] with size {}.", args.model, args.size);
            let generator = ProgramGenerator::new(choose_model::<F>(args.model, args.size))?;
            ExplicitModelBuilder::new(generator, options).build()?
        }
    };
    info!(
        "Built {} with {} states. Elapsed: {:?}",
        model.model_type(),
        model.number_of_states(),
        time_start.elapsed()
    );
    if !model.reward_models().is_empty() {
        info!("Reward models: {}", model.reward_models().keys().join(", "));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&Summary::new(&model))?);
    } else {
        print!("{model}");
    }
    if let Some(prefix) = &args.output {
        export(&model, prefix)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (pre_physical_mem, pre_virtual_mem) = if let Some(usage) = memory_stats() {
        (usage.physical_mem, usage.virtual_mem)
    } else {
        warn!("Couldn't get the current memory usage :(");
        (0, 0)
    };
    let time_start = Instant::now();
    info!("Using [{:?}] as numerical field.", args.numeric_field);
    let result = match args.numeric_field {
        NumericField::Rational => run::<Rational>(&args),
        NumericField::F64 => run::<Float64>(&args),
    };

    let elapsed = time_start.elapsed();
    let (post_physical_mem, post_virtual_mem) = if let Some(usage) = memory_stats() {
        (usage.physical_mem, usage.virtual_mem)
    } else {
        warn!("Couldn't get the current memory usage :(");
        (0, 0)
    };
    info!(
        "Elapsed: {:?}. physical mem used: {:.2} MB. virtual mem used: {:.2} MB",
        elapsed,
        post_physical_mem.saturating_sub(pre_physical_mem) as f64 / 1048576.0,
        post_virtual_mem.saturating_sub(pre_virtual_mem) as f64 / 1048576.0
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
