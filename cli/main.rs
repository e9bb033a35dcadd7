//! This module contains the main entrypoint to the wayfarer cli.

use anyhow::{format_err, Result};
use backtrace::Backtrace;
use clap::Parser;
use colored::Colorize;
use once_cell::sync::Lazy;
use std::{
	io::Read,
	path::{Path, PathBuf},
	sync::Mutex,
};
use wayfarer_core::{
	config::{load_config, TrainingOptions},
	predict::sample_input,
	PredictionService, TrainReport,
};

#[derive(Parser)]
#[clap(
	about = "Predict where a traveler is headed next, and explain why.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	#[clap(name = "train")]
	Train(Box<TrainOptions>),
	#[clap(name = "predict")]
	Predict(Box<PredictOptions>),
	#[clap(name = "info")]
	Info(Box<InfoOptions>),
	#[clap(name = "sample")]
	Sample,
	#[clap(name = "app")]
	App(Box<AppOptions>),
}

#[derive(Parser, Debug)]
#[clap(about = "train a model")]
#[clap(long_about = "train a destination model from a csv file of past trips")]
struct TrainOptions {
	#[clap(short, long, help = "the path to your .csv file of trips")]
	file: PathBuf,
	#[clap(short, long, help = "the path to a .yaml config file")]
	config: Option<PathBuf>,
	#[clap(short, long, help = "the path to write the .wayfarer file to")]
	output: Option<PathBuf>,
	#[clap(long, help = "the path to write the training report to as json")]
	report: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[clap(about = "predict destinations for one traveler")]
struct PredictOptions {
	#[clap(short, long, help = "the path to a .wayfarer file")]
	model: PathBuf,
	#[clap(
		short,
		long,
		help = "the path to a .json file describing the traveler, or - to read stdin"
	)]
	input: PathBuf,
	#[clap(long, help = "the number of destinations to return")]
	top_k: Option<usize>,
}

#[derive(Parser, Debug)]
#[clap(about = "print information about a model")]
struct InfoOptions {
	#[clap(short, long, help = "the path to a .wayfarer file")]
	model: PathBuf,
}

#[derive(Parser, Debug)]
#[clap(about = "run the app")]
#[clap(long_about = "serve predictions over http")]
struct AppOptions {
	#[clap(short, long, env = "MODEL", help = "the path to a .wayfarer file")]
	model: PathBuf,
	#[clap(long, env = "HOST", default_value = "0.0.0.0")]
	host: std::net::IpAddr,
	#[clap(long, env = "PORT", default_value = "8080")]
	port: u16,
}

fn main() {
	let env = env_logger::Env::default().default_filter_or("wayfarer=info");
	env_logger::Builder::from_env(env)
		.format_module_path(false)
		.format_timestamp(None)
		.init();
	let options = Options::parse();
	let result = match options {
		Options::Train(options) => cli_train(*options),
		Options::Predict(options) => cli_predict(*options),
		Options::Info(options) => cli_info(*options),
		Options::Sample => cli_sample(),
		Options::App(options) => cli_app(*options),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_train(options: TrainOptions) -> Result<()> {
	// Retrieve the output path from the command line arguments or generate a default.
	let output_path = match options.output.clone() {
		Some(output) => output,
		None => {
			let dir = std::env::current_dir()?;
			let csv_file_name = options
				.file
				.file_stem()
				.and_then(|stem| stem.to_str())
				.ok_or_else(|| format_err!("bad data file path {}", options.file.display()))?;
			available_path(&dir, csv_file_name, "wayfarer")?
		}
	};
	let config = load_config(options.config.as_deref())?;
	let training_options = TrainingOptions::from_config(&config)?;

	// A panic during training is reported like any other error, with its backtrace.
	static PANIC_MESSAGE_AND_BACKTRACE: Lazy<Mutex<Option<(String, Backtrace)>>> =
		Lazy::new(|| Mutex::new(None));
	let hook = std::panic::take_hook();
	std::panic::set_hook(Box::new(|panic_info| {
		let value = (panic_info.to_string(), Backtrace::new());
		if let Ok(mut panic_message_and_backtrace) = PANIC_MESSAGE_AND_BACKTRACE.lock() {
			panic_message_and_backtrace.replace(value);
		}
	}));
	let result = std::panic::catch_unwind(|| {
		wayfarer_core::train(&options.file, training_options, Some(output_path.as_path()))
	});
	std::panic::set_hook(hook);
	let (_, report) = match result {
		Ok(result) => result,
		Err(_) => {
			let panic_info = PANIC_MESSAGE_AND_BACKTRACE
				.lock()
				.map_err(|_| format_err!("training panicked"))?;
			match panic_info.as_ref() {
				Some((message, backtrace)) => Err(format_err!("{}\n{:?}", message, backtrace)),
				None => Err(format_err!("training panicked")),
			}
		}
	}?;

	if let Some(report_path) = &options.report {
		let report_json = serde_json::to_string_pretty(&report)?;
		std::fs::write(report_path, report_json)?;
		eprintln!("The training report was written to {}.", report_path.display());
	}
	print_summary(&report);
	eprintln!("Your model was written to {}.", output_path.display());
	eprintln!("To serve predictions from it, run `wayfarer app --model {}`.", output_path.display());
	Ok(())
}

fn print_summary(report: &TrainReport) {
	eprintln!("{}", report.model_name.bold());
	eprintln!("  test accuracy   {:.4}", report.test_accuracy);
	eprintln!("  train accuracy  {:.4}", report.train_accuracy);
	eprintln!(
		"  samples         {} train, {} test",
		report.training_samples, report.test_samples
	);
	eprintln!("  destinations    {}", report.unique_destinations);
	eprintln!("  features        {}", report.feature_count);
	eprintln!(
		"  parameters      n_estimators={} learning_rate={} max_depth={}",
		report.best_parameters.n_estimators,
		report.best_parameters.learning_rate,
		report.best_parameters.max_depth
	);
}

fn cli_predict(options: PredictOptions) -> Result<()> {
	let service = PredictionService::load(&options.model)?;
	let input = if options.input == Path::new("-") {
		let mut input = String::new();
		std::io::stdin().read_to_string(&mut input)?;
		input
	} else {
		std::fs::read_to_string(&options.input)
			.map_err(|error| format_err!("failed to read {}: {}", options.input.display(), error))?
	};
	let record = match serde_json::from_str(&input)? {
		serde_json::Value::Object(record) => record,
		_ => return Err(format_err!("the input must be a json object")),
	};
	let response = service.predict(&record, options.top_k)?;
	println!("{}", serde_json::to_string_pretty(&response)?);
	Ok(())
}

fn cli_info(options: InfoOptions) -> Result<()> {
	let service = PredictionService::load(&options.model)?;
	let model_info = service.model_info()?;
	println!("{}", serde_json::to_string_pretty(&model_info)?);
	Ok(())
}

fn cli_sample() -> Result<()> {
	println!("{}", serde_json::to_string_pretty(&sample_input())?);
	Ok(())
}

fn cli_app(options: AppOptions) -> Result<()> {
	if !options.model.exists() {
		return Err(format_err!(
			"model file {} not found, train a model first with `wayfarer train`",
			options.model.display()
		));
	}
	wayfarer_app::run(wayfarer_app::Options {
		host: options.host,
		model: Some(options.model),
		port: options.port,
	})
}

/// This function checks if a file with the given name and extension already exists in `dir`, and if it does, it appends " 1", " 2", etc. to it until it finds a name that will not overwrite an existing file.
fn available_path(dir: &Path, name: &str, extension: &str) -> Result<PathBuf> {
	let mut i = 0;
	loop {
		let mut filename = name.to_owned();
		if i > 0 {
			filename.push(' ');
			filename.push_str(&i.to_string());
		}
		filename.push('.');
		filename.push_str(extension);
		let path = dir.join(filename);
		match std::fs::metadata(&path) {
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(path),
			Err(error) => return Err(error.into()),
			Ok(_) => i += 1,
		}
	}
}
