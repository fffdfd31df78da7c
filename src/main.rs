use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod category;
mod client;
mod config;
mod evaluation;
mod extract;
mod models;
mod output;
mod report;
mod runner;
mod store;

use crate::client::OpenAiClient;
use crate::config::Config;
use crate::evaluation::Evaluator;
use crate::output::OutputFormat;
use crate::runner::Runner;
use crate::store::{EvaluationStore, LegacyEvaluations, QuestionSet};

/// Health answer evaluation - collect model answers, judge them, and aggregate the scores
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - show progress for each API request
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask every configured answer model for missing responses
    Generate,
    /// Judge new or changed responses and merge them into the evaluation store
    Evaluate,
    /// Print aggregate statistics from the evaluation store
    Report,
    /// Print the category a question falls into
    Categorize {
        /// Question text
        question: String,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_runner(config: &Config) -> Runner<OpenAiClient> {
    let evaluator = Evaluator::new(
        OpenAiClient::new(config.answer.client.clone()),
        OpenAiClient::new(config.judge.client.clone()),
        config.answer.clone(),
        config.judge.clone(),
    );
    Runner::new(evaluator, config.scoring.out_of_range)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_file(&args.config)?;

    match args.command {
        Command::Generate => {
            let mut questions = QuestionSet::load(&config.paths.questions)?;
            info!(
                "Generating responses for {} questions with {} models",
                questions.questions.len(),
                config.answer.models.len()
            );

            let mut runner = build_runner(&config);
            let summary = runner.generate(&mut questions, &config.answer.models).await?;
            output::print_summary("Response generation", &summary, args.output);
        }
        Command::Evaluate => {
            let questions = QuestionSet::load(&config.paths.questions)?;
            let mut store = EvaluationStore::load(&config.paths.evaluations)?;
            let legacy = match &config.paths.legacy_evaluations {
                Some(path) => LegacyEvaluations::load(path)?,
                None => LegacyEvaluations::default(),
            };
            info!(
                "Evaluating {} questions against {} stored records ({} legacy evaluations)",
                questions.questions.len(),
                store.len(),
                legacy.len()
            );

            let mut runner = build_runner(&config);
            let summary = runner
                .evaluate(&questions.questions, &mut store, &legacy)
                .await?;
            info!("Evaluation store saved to {}", config.paths.evaluations.display());
            output::print_summary("Evaluation", &summary, args.output);
        }
        Command::Report => {
            let store = EvaluationStore::load(&config.paths.evaluations)?;
            let report = report::build_report(store.records(), config.scoring.low_accuracy_threshold);
            output::print_report(&report, args.output);
        }
        Command::Categorize { question } => {
            println!("{}", category::categorize(&question));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evaluate_command() {
        let args = Args::try_parse_from(["health-eval", "study.toml", "-o", "json", "-v", "evaluate"]).unwrap();
        assert_eq!(args.config, PathBuf::from("study.toml"));
        assert!(matches!(args.output, OutputFormat::Json));
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Evaluate));
    }

    #[test]
    fn test_parse_categorize_command() {
        let args = Args::try_parse_from(["health-eval", "study.toml", "categorize", "Is my heart ok?"]).unwrap();
        match args.command {
            Command::Categorize { question } => assert_eq!(question, "Is my heart ok?"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_missing_command_is_error() {
        assert!(Args::try_parse_from(["health-eval", "study.toml"]).is_err());
    }
}
