use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use serde::Serialize;
use std::path::PathBuf;

use scannot_classifiers::registry::SaveOptions;
use scannot_cli::commands::classify::{run_classification, ClassifyConfig};
use scannot_cli::commands::evaluate::{run_evaluation, EvaluateConfig};
use scannot_cli::commands::models;
use scannot_cli::commands::train::{run_training, TrainConfig};
use scannot_cli::util::{default_models_from_env, open_registries};

fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "error,scannot=debug"
    } else {
        "error,scannot=info"
    };
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("SCANNOT_LOG", default_filter))
        .init();

    let result = match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("evaluate", sub_m)) => handle_evaluate(sub_m),
        Some(("classify", sub_m)) => handle_classify(sub_m),
        Some(("models", sub_m)) => handle_models(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1)
    }
    Ok(())
}

fn config_arg(help: &'static str) -> Arg {
    Arg::new("config")
        .help(help)
        .required(false)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn registry_arg() -> Arg {
    Arg::new("registry")
        .long("registry")
        .help("Directory of the user classifier registry.")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .value_hint(ValueHint::DirPath)
}

fn default_models_arg() -> Arg {
    Arg::new("default_models")
        .long("default-models")
        .help(
            "Directory of the read-only default classifiers. \
             Falls back to the SCANNOT_DEFAULT_MODELS environment variable.",
        )
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .value_hint(ValueHint::DirPath)
}

fn build_cli() -> Command {
    Command::new("scannot")
        .version(clap::crate_version!())
        .about("Hierarchical cell-type classification for single-cell RNA-seq data")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .global(true)
                .help("Log debug messages (SCANNOT_LOG takes precedence).")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("train")
                .about("Train a classifier for one cell type from labeled cells")
                .arg(config_arg("Path to the training configuration file"))
                .arg(
                    Arg::new("train_data")
                        .short('d')
                        .long("train_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the training expression table (*.tsv or *.csv). \
                             Overrides the file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("File the trained classifier (JSON) is written to.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("cell_type")
                        .long("cell-type")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Cell type to train."),
                )
                .arg(
                    Arg::new("marker_genes")
                        .long("markers")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Comma separated marker genes."),
                )
                .arg(
                    Arg::new("parent")
                        .long("parent")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Parent cell type, resolved from the registries."),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(clap::value_parser!(u64))
                        .help("Seed for the class-balancing subsample."),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .help("Replace a classifier of the same name in the registry.")
                        .action(ArgAction::SetTrue),
                )
                .arg(registry_arg())
                .arg(default_models_arg()),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Evaluate a trained classifier against labeled cells")
                .arg(config_arg("Path to the evaluation configuration file"))
                .arg(
                    Arg::new("test_data")
                        .short('d')
                        .long("test_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Path to the labeled expression table (*.tsv or *.csv).")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("classifier_file")
                        .short('m')
                        .long("model")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Classifier file written by `scannot train`.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("classifier_name")
                        .long("name")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .conflicts_with("classifier_file")
                        .help("Name of a classifier stored in the registries."),
                )
                .arg(
                    Arg::new("report_file")
                        .short('o')
                        .long("output_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("File the evaluation report (JSON) is written to.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(registry_arg())
                .arg(default_models_arg()),
        )
        .subcommand(
            Command::new("classify")
                .about("Predict cell types with the classifiers of one or more registries")
                .arg(config_arg("Path to the classification configuration file"))
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Path to the expression table to classify (*.tsv or *.csv).")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Path of the prediction table (*.tsv or *.csv).")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("cell_types")
                        .long("cell-types")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Comma separated cell types to predict (ancestors are added)."),
                )
                .arg(
                    Arg::new("ignore_ambiguous")
                        .long("ignore-ambiguous")
                        .help("Report only the deepest passing types of each cell.")
                        .action(ArgAction::SetTrue),
                )
                .arg(registry_arg())
                .arg(default_models_arg()),
        )
        .subcommand(
            Command::new("models")
                .about("Inspect and manage classifier registries")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("List the available classifiers")
                        .arg(registry_arg())
                        .arg(default_models_arg()),
                )
                .subcommand(
                    Command::new("add")
                        .about("Import a classifier file into the user registry")
                        .arg(
                            Arg::new("file")
                                .required(true)
                                .value_parser(clap::value_parser!(PathBuf))
                                .value_hint(ValueHint::FilePath),
                        )
                        .arg(registry_arg().required(true))
                        .arg(default_models_arg())
                        .arg(
                            Arg::new("overwrite")
                                .long("overwrite")
                                .action(ArgAction::SetTrue),
                        )
                        .arg(
                            Arg::new("include_default")
                                .long("include-default")
                                .help("Resolve names and parents against the default classifiers too.")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a classifier from the user registry")
                        .arg(Arg::new("name").required(true))
                        .arg(registry_arg().required(true))
                        .arg(default_models_arg()),
                )
                .subcommand(
                    Command::new("set-threshold")
                        .about("Change the probability threshold of a stored classifier")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("threshold")
                                .required(true)
                                .value_parser(clap::value_parser!(f64)),
                        )
                        .arg(registry_arg().required(true))
                        .arg(default_models_arg()),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}

/// Print the default configuration when no file was given.
fn print_template<T: Serialize>(template: &T) -> Result<()> {
    eprintln!("[scannot] No config file provided; printing the default configuration template.");
    println!("{}", serde_json::to_string_pretty(template)?);
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        return print_template(&TrainConfig::default());
    };
    log::info!("[scannot::train] Training from config: {:?}", config_path);

    let config = TrainConfig::from_arguments(config_path, matches)?;
    run_training(&config)?;
    Ok(())
}

fn handle_evaluate(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        return print_template(&EvaluateConfig::default());
    };
    log::info!("[scannot::evaluate] Evaluating with config: {:?}", config_path);

    let config = EvaluateConfig::from_arguments(config_path, matches)?;
    run_evaluation(&config)?;
    Ok(())
}

fn handle_classify(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        return print_template(&ClassifyConfig::default());
    };
    log::info!("[scannot::classify] Classifying with config: {:?}", config_path);

    let config = ClassifyConfig::from_arguments(config_path, matches)?;
    run_classification(&config)?;
    Ok(())
}

fn handle_models(matches: &ArgMatches) -> Result<()> {
    let (name, sub_m) = matches
        .subcommand()
        .ok_or_else(|| anyhow::anyhow!("A models subcommand is required"))?;

    let registry = sub_m.get_one::<String>("registry").map(String::as_str);
    let defaults = sub_m
        .get_one::<String>("default_models")
        .cloned()
        .or_else(default_models_from_env);
    let registries = open_registries(registry, defaults.as_deref())?;

    match name {
        "list" => {
            for summary in models::list_models(&registries)? {
                println!("{}", summary.to_tsv_row());
            }
        }
        "add" => {
            let file: &PathBuf = sub_m
                .get_one("file")
                .ok_or_else(|| anyhow::anyhow!("A classifier file is required"))?;
            let options = SaveOptions {
                overwrite: sub_m.get_flag("overwrite"),
                include_default: sub_m.get_flag("include_default"),
            };
            let path = models::add_model(&registries, file, options)?;
            log::info!("[scannot::models] Added {}", path.display());
        }
        "delete" => {
            let cell_type: &String = sub_m
                .get_one("name")
                .ok_or_else(|| anyhow::anyhow!("A cell type is required"))?;
            models::delete_model(&registries, cell_type)?;
        }
        "set-threshold" => {
            let cell_type: &String = sub_m
                .get_one("name")
                .ok_or_else(|| anyhow::anyhow!("A cell type is required"))?;
            let threshold: f64 = *sub_m
                .get_one("threshold")
                .ok_or_else(|| anyhow::anyhow!("A threshold is required"))?;
            models::set_threshold(&registries, cell_type, threshold)?;
        }
        other => anyhow::bail!("Unknown models subcommand: {}", other),
    }
    Ok(())
}
