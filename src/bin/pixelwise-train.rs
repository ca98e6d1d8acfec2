//! Compose class ground truth from annotation layers and run one training job.

use std::path::PathBuf;

use pixelwise_trainer::{
    config,
    job::{JobOutputs, run_job_from_paths},
    layers::InputPaths,
    logging,
    plan::ModelSlots,
    trainer::CommandTrainer,
};

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let config = config::load_or_default(options.config.as_deref()).map_err(|err| err.to_string())?;
    let trainer = CommandTrainer::new(&options.trainer)
        .args(&options.trainer_args)
        .with_redirect_level(config.logging.redirect_level);

    let report = run_job_from_paths(&options.inputs, &options.outputs, &config, &trainer)
        .map_err(|err| describe(&err))?;
    for (class, path) in &report.artifacts {
        println!("{class}: {}", path.display());
    }
    Ok(())
}

/// Render an error with its chain of causes.
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(&format!("\n  caused by: {cause_text}"));
        }
        source = cause.source();
    }
    message
}

#[derive(Debug, Clone)]
struct CliOptions {
    inputs: InputPaths,
    outputs: JobOutputs,
    config: Option<PathBuf>,
    trainer: PathBuf,
    trainer_args: Vec<String>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut image = None;
    let mut background = None;
    let mut symbols = None;
    let mut regions = None;
    let mut staff = None;
    let mut text = None;
    let mut background_model = None;
    let mut symbols_model = None;
    let mut staff_model = None;
    let mut text_model = None;
    let mut log_file = None;
    let mut config = None;
    let mut trainer = None;
    let mut trainer_args = Vec::new();

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if flag == "-h" || flag == "--help" {
            return Err(help_text());
        }
        idx += 1;
        let value = args
            .get(idx)
            .ok_or_else(|| format!("{flag} requires a value"))?;
        let path = PathBuf::from(value);
        match flag {
            "--image" => image = Some(path),
            "--background" => background = Some(path),
            "--symbols" => symbols = Some(path),
            "--regions" => regions = Some(path),
            "--staff" => staff = Some(path),
            "--text" => text = Some(path),
            "--background-model" => background_model = Some(path),
            "--symbols-model" => symbols_model = Some(path),
            "--staff-model" => staff_model = Some(path),
            "--text-model" => text_model = Some(path),
            "--log-file" => log_file = Some(path),
            "--config" => config = Some(path),
            "--trainer" => trainer = Some(path),
            "--trainer-arg" => trainer_args.push(value.clone()),
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let required = |value: Option<PathBuf>, flag: &str| {
        value.ok_or_else(|| format!("{flag} is required\n\n{}", help_text()))
    };
    Ok(CliOptions {
        inputs: InputPaths {
            image: required(image, "--image")?,
            selection: required(regions, "--regions")?,
            background: required(background, "--background")?,
            symbols: required(symbols, "--symbols")?,
            staff,
            text,
        },
        outputs: JobOutputs {
            models: ModelSlots {
                background: required(background_model, "--background-model")?,
                symbols: required(symbols_model, "--symbols-model")?,
                staff: staff_model,
                text: text_model,
            },
            log_file: required(log_file, "--log-file")?,
        },
        config,
        trainer: required(trainer, "--trainer")?,
        trainer_args,
    })
}

fn help_text() -> String {
    [
        "pixelwise-train",
        "",
        "Builds per-class ground truth from RGBA annotation layers and runs one training job.",
        "",
        "Usage:",
        "  pixelwise-train --image <png> --background <png> --symbols <png> --regions <png>",
        "                  --background-model <path> --symbols-model <path> --log-file <path>",
        "                  --trainer <program> [options]",
        "",
        "Options:",
        "  --staff <png>           Staff lines layer (trained only with --staff-model).",
        "  --text <png>            Text layer (trained only with --text-model).",
        "  --staff-model <path>    Destination of the staff lines model.",
        "  --text-model <path>     Destination of the text model.",
        "  --config <toml>         Job settings ([training] and [logging] tables).",
        "  --trainer-arg <arg>     Extra argument passed to the trainer before the manifest path.",
    ]
    .join("\n")
}
