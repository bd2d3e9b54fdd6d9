use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileOptimizationConfig};
use super::models::AppConfig;
use crate::cli::{EnergyArgs, OptimizeArgs, SystemArgs};
use crate::error::{CliError, Result};
use molrelax::engine::config::{
    self as core_config, GradientMode, OptimizationParameters, RunMode, convergence_from_exponent,
};
use serde::de::{DeserializeOwned, IntoDeserializer, value};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Values given as explicit flags. They win over everything else.
#[derive(Default)]
struct Overrides {
    max_steps: Option<usize>,
    algorithm: Option<core_config::Algorithm>,
    gradients: Option<GradientMode>,
    convergence: Option<f64>,
    convergence_exponent: Option<i32>,
    run_mode: Option<RunMode>,
}

pub fn build_optimize_config(args: &OptimizeArgs) -> Result<AppConfig> {
    let overrides = Overrides {
        max_steps: args.max_steps,
        algorithm: args.algorithm.map(Into::into),
        gradients: args.gradients.map(Into::into),
        convergence: args.convergence,
        convergence_exponent: args.convergence_exponent,
        run_mode: args.run_mode.map(Into::into),
    };
    let mut app = build(&args.system, overrides)?;
    if app.parameters.run_mode == RunMode::SinglePoint {
        return Err(CliError::Config(
            "run mode 'single-point' is not an optimization; use the 'energy' command".to_string(),
        ));
    }
    app.output_path = Some(args.output.clone());
    Ok(app)
}

pub fn build_energy_config(args: &EnergyArgs) -> Result<AppConfig> {
    let overrides = Overrides {
        gradients: args.gradients.map(Into::into),
        run_mode: Some(RunMode::SinglePoint),
        ..Default::default()
    };
    build(&args.system, overrides)
}

fn build(system: &SystemArgs, overrides: Overrides) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let (file_config, base_dir) = match &system.config {
        Some(path) => (
            FileConfig::from_file(path)?,
            path.parent().map(Path::to_path_buf),
        ),
        None => (FileConfig::default(), None),
    };
    let mut file_config = apply_set_values(file_config, &system.set_values)?;

    let ff_file = file_config.forcefield.take().unwrap_or_default();
    let opt_file = file_config.optimization.take().unwrap_or_default();
    let dyn_file = file_config.dynamics.take().unwrap_or_default();

    let resolve = |path: PathBuf| match &base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    };
    let constraints_path = system
        .constraints
        .clone()
        .or_else(|| file_config.constraints.take().map(resolve));
    let lj_params_path = system
        .lj_params
        .clone()
        .or_else(|| ff_file.lj_params.map(resolve));

    let convergence = merge_convergence(&overrides, &opt_file, &defaults)?;

    let parameters = OptimizationParameters::builder()
        .evaluator(ff_file.evaluator.unwrap_or(defaults.evaluator))
        .max_steps(
            overrides
                .max_steps
                .or(opt_file.max_steps)
                .unwrap_or(defaults.max_steps),
        )
        .algorithm(
            overrides
                .algorithm
                .or(opt_file.algorithm)
                .unwrap_or(defaults.algorithm),
        )
        .gradients(
            overrides
                .gradients
                .or(opt_file.gradients)
                .unwrap_or(defaults.gradients),
        )
        .convergence(convergence)
        .criterion(opt_file.criterion.unwrap_or(defaults.criterion))
        .run_mode(
            overrides
                .run_mode
                .or(opt_file.run_mode)
                .unwrap_or(defaults.run_mode),
        )
        .step_size(opt_file.step_size.unwrap_or(defaults.step_size))
        .max_displacement(
            opt_file
                .max_displacement
                .unwrap_or(defaults.max_displacement),
        )
        .progress_interval(
            opt_file
                .progress_interval
                .unwrap_or(defaults.progress_interval),
        )
        .time_step(dyn_file.time_step.unwrap_or(defaults.time_step))
        .damping(dyn_file.damping.unwrap_or(defaults.damping))
        .restraint_force_constant(
            ff_file
                .restraint_force_constant
                .unwrap_or(defaults.restraint_force_constant),
        )
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        input_path: system.input.clone(),
        output_path: None,
        constraints_path,
        lj_params_path,
        parameters,
    })
}

fn merge_convergence(
    overrides: &Overrides,
    file_val: &FileOptimizationConfig,
    defaults: &DefaultsConfig,
) -> Result<f64> {
    if let Some(threshold) = overrides.convergence {
        return Ok(threshold);
    }
    if let Some(exponent) = overrides.convergence_exponent {
        return Ok(convergence_from_exponent(exponent));
    }
    match (file_val.convergence, file_val.convergence_exponent) {
        (Some(_), Some(_)) => Err(CliError::Config(
            "`optimization` sets both `convergence` and `convergence-exponent`".to_string(),
        )),
        (Some(threshold), None) => Ok(threshold),
        (None, Some(exponent)) => Ok(convergence_from_exponent(exponent)),
        (None, None) => Ok(convergence_from_exponent(defaults.convergence_exponent)),
    }
}

fn parse_number<T>(key: &str, value_str: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value_str.parse().map_err(|e| {
        CliError::Config(format!("Invalid value for {}: '{}' ({})", key, value_str, e))
    })
}

fn parse_choice<T: DeserializeOwned>(key: &str, value_str: &str) -> Result<T> {
    let deserializer: value::StrDeserializer<'_, value::Error> = value_str.into_deserializer();
    T::deserialize(deserializer).map_err(|e| {
        CliError::Config(format!("Invalid value for {}: '{}' ({})", key, value_str, e))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let (key, value_str) = (key.trim(), value_str.trim());

        match key {
            "constraints" => config.constraints = Some(PathBuf::from(value_str)),
            "forcefield.evaluator" => {
                config
                    .forcefield
                    .get_or_insert_with(Default::default)
                    .evaluator = Some(value_str.to_string());
            }
            "forcefield.lj-params" => {
                config
                    .forcefield
                    .get_or_insert_with(Default::default)
                    .lj_params = Some(PathBuf::from(value_str));
            }
            "forcefield.restraint-force-constant" => {
                config
                    .forcefield
                    .get_or_insert_with(Default::default)
                    .restraint_force_constant = Some(parse_number(key, value_str)?);
            }
            "dynamics.time-step" => {
                config
                    .dynamics
                    .get_or_insert_with(Default::default)
                    .time_step = Some(parse_number(key, value_str)?);
            }
            "dynamics.damping" => {
                config.dynamics.get_or_insert_with(Default::default).damping =
                    Some(parse_number(key, value_str)?);
            }
            _ => {
                let Some(field) = key.strip_prefix("optimization.") else {
                    return Err(unsupported(key));
                };
                let opt = config.optimization.get_or_insert_with(Default::default);
                match field {
                    "max-steps" => opt.max_steps = Some(parse_number(key, value_str)?),
                    "algorithm" => opt.algorithm = Some(parse_choice(key, value_str)?),
                    "gradients" => opt.gradients = Some(parse_choice(key, value_str)?),
                    "convergence" => opt.convergence = Some(parse_number(key, value_str)?),
                    "convergence-exponent" => {
                        opt.convergence_exponent = Some(parse_number(key, value_str)?)
                    }
                    "criterion" => opt.criterion = Some(parse_choice(key, value_str)?),
                    "run-mode" => opt.run_mode = Some(parse_choice(key, value_str)?),
                    "step-size" => opt.step_size = Some(parse_number(key, value_str)?),
                    "max-displacement" => {
                        opt.max_displacement = Some(parse_number(key, value_str)?)
                    }
                    "progress-interval" => {
                        opt.progress_interval = Some(parse_number(key, value_str)?)
                    }
                    _ => return Err(unsupported(key)),
                }
            }
        }
    }
    Ok(config)
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!(
        "Unsupported configuration key for --set: '{}'",
        key
    ))
}
