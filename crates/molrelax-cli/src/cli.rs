use clap::{Args, Parser, Subcommand, ValueEnum};
use molrelax::engine::config::{Algorithm, GradientMode, RunMode};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "molrelax - geometry optimization and single-point energies for molecular structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relax a structure by energy minimization or damped dynamics.
    Optimize(OptimizeArgs),
    /// Evaluate the energy of a structure without moving it.
    Energy(EnergyArgs),
}

/// Inputs shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct SystemArgs {
    /// Path to the input structure in XYZ format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to a constraints file in CSV format (kind,a,b,c,target).
    #[arg(long, value_name = "PATH")]
    pub constraints: Option<PathBuf>,

    /// Path to Lennard-Jones parameter overrides in TOML format.
    #[arg(long, value_name = "PATH")]
    pub lj_params: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimization.max-steps=200
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `optimize` subcommand.
#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub system: SystemArgs,

    /// Path for the relaxed structure.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Override the maximum number of cycles.
    #[arg(long = "steps", value_name = "INT")]
    pub max_steps: Option<usize>,

    /// Override the minimization algorithm.
    #[arg(long, value_enum, value_name = "ALGORITHM")]
    pub algorithm: Option<AlgorithmArg>,

    /// Override how gradients are computed.
    #[arg(long, value_enum, value_name = "MODE")]
    pub gradients: Option<GradientArg>,

    /// Override the convergence threshold.
    #[arg(long, value_name = "FLOAT", conflicts_with = "convergence_exponent")]
    pub convergence: Option<f64>,

    /// Override the convergence threshold as an exponent n, meaning 10^-n.
    #[arg(long, value_name = "INT")]
    pub convergence_exponent: Option<i32>,

    /// Override what kind of run to perform.
    #[arg(long, value_enum, value_name = "MODE")]
    pub run_mode: Option<RunModeArg>,
}

/// Arguments for the `energy` subcommand.
#[derive(Args, Debug, Clone)]
pub struct EnergyArgs {
    #[command(flatten)]
    pub system: SystemArgs,

    /// Override how gradients are computed.
    #[arg(long, value_enum, value_name = "MODE")]
    pub gradients: Option<GradientArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmArg {
    /// Steepest descent
    Sd,
    /// Polak-Ribiere conjugate gradients
    Cg,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sd => Algorithm::SteepestDescent,
            AlgorithmArg::Cg => Algorithm::ConjugateGradients,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientArg {
    Analytical,
    Numerical,
}

impl From<GradientArg> for GradientMode {
    fn from(arg: GradientArg) -> Self {
        match arg {
            GradientArg::Analytical => GradientMode::Analytical,
            GradientArg::Numerical => GradientMode::Numerical,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunModeArg {
    Minimize,
    Dynamics,
}

impl From<RunModeArg> for RunMode {
    fn from(arg: RunModeArg) -> Self {
        match arg {
            RunModeArg::Minimize => RunMode::Minimize,
            RunModeArg::Dynamics => RunMode::Dynamics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn optimize_arguments_parse() {
        let cli = Cli::parse_from([
            "molrelax",
            "-vv",
            "optimize",
            "-i",
            "in.xyz",
            "-o",
            "out.xyz",
            "--steps",
            "250",
            "--algorithm",
            "cg",
            "--gradients",
            "numerical",
            "--convergence-exponent",
            "6",
            "-S",
            "dynamics.damping=0.1",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Optimize(args) = cli.command else {
            panic!("expected the optimize subcommand");
        };
        assert_eq!(args.system.input, PathBuf::from("in.xyz"));
        assert_eq!(args.output, PathBuf::from("out.xyz"));
        assert_eq!(args.max_steps, Some(250));
        assert_eq!(args.algorithm, Some(AlgorithmArg::Cg));
        assert_eq!(args.gradients, Some(GradientArg::Numerical));
        assert_eq!(args.convergence_exponent, Some(6));
        assert_eq!(args.system.set_values, vec!["dynamics.damping=0.1"]);
    }

    #[test]
    fn convergence_and_exponent_conflict() {
        let result = Cli::try_parse_from([
            "molrelax",
            "optimize",
            "-i",
            "in.xyz",
            "-o",
            "out.xyz",
            "--convergence",
            "1e-5",
            "--convergence-exponent",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn energy_does_not_take_an_output() {
        let result = Cli::try_parse_from(["molrelax", "energy", "-i", "in.xyz", "-o", "out.xyz"]);
        assert!(result.is_err());

        let cli = Cli::parse_from(["molrelax", "--quiet", "energy", "-i", "in.xyz"]);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Energy(_)));
    }

    #[test]
    fn value_enums_map_to_engine_enums() {
        assert_eq!(Algorithm::from(AlgorithmArg::Sd), Algorithm::SteepestDescent);
        assert_eq!(Algorithm::from(AlgorithmArg::Cg), Algorithm::ConjugateGradients);
        assert_eq!(RunMode::from(RunModeArg::Dynamics), RunMode::Dynamics);
        assert_eq!(GradientMode::from(GradientArg::Numerical), GradientMode::Numerical);
    }
}
