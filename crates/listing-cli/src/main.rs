mod app;
mod wizard;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use app::{AppContext, TerminalRouter};
use clap::{Parser, Subcommand, ValueEnum};
use flow_host::{ExitMode, FlowSession, HostConfig, SessionStep};
use flow_spec::{
    FlowSpec, QuestionGraph, QuestionKind, RenderQuestion, ValidationResult, render_json_ui,
    total_steps,
};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter, needs_input};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based listing wizard",
    long_about = "Runs the listing creation flows in a terminal, with draft autosave, answer validation, and flow definition checks"
)]
struct Cli {
    /// Host configuration file (JSON).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Show verbose output (statuses, visible questions, debug logs).
    #[arg(long, short, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List the available flows.
    List,
    /// Run a flow interactively.
    Wizard {
        /// Flow id, as shown by `list`.
        #[arg(long, value_name = "FLOW")]
        flow: String,
        /// Continue from the saved draft if there is one.
        #[arg(long)]
        resume: bool,
        /// Also print the submitted answers as JSON.
        #[arg(long)]
        answers_json: bool,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate an answers file against a flow.
    Validate {
        #[arg(long, value_name = "FLOW")]
        flow: String,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Show "step X of Y" and the next question for an answers file.
    Progress {
        #[arg(long, value_name = "FLOW")]
        flow: String,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Check a flow definition file for configuration errors.
    Check {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
    },
    /// Print the JSON Schema for flow definitions.
    Schema,
    /// Inspect or remove saved drafts.
    Drafts {
        #[command(subcommand)]
        action: DraftsCommand,
    },
}

#[derive(Subcommand)]
enum DraftsCommand {
    /// List flows with a saved draft.
    List,
    /// Print a saved draft.
    Show { flow: String },
    /// Delete a saved draft.
    Discard { flow: String },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Schema => return run_schema(),
        Command::Check { spec } => return run_check(spec),
        _ => {}
    }

    let config = HostConfig::load(cli.config.as_deref())?;
    let ctx = AppContext::init(config, Arc::new(TerminalRouter))?;
    let result = match cli.command {
        Command::List => run_list(&ctx),
        Command::Wizard {
            flow,
            resume,
            answers_json,
            format,
        } => run_wizard(&ctx, &flow, resume, cli.verbose, answers_json, format),
        Command::Validate { flow, answers } => run_validate(&ctx, &flow, &answers),
        Command::Progress { flow, answers } => run_progress(&ctx, &flow, &answers),
        Command::Drafts { action } => run_drafts(&ctx, action),
        Command::Schema | Command::Check { .. } => Ok(()),
    };
    ctx.teardown();
    result
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run_list(ctx: &AppContext) -> CliResult<()> {
    let drafts = ctx.drafts().list().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not list drafts");
        Vec::new()
    });
    for graph in ctx.catalog().flows() {
        let mut line = format!(
            "{}\t{} (v{}, {} questions)",
            graph.id(),
            graph.title(),
            graph.version(),
            graph.len()
        );
        if drafts.iter().any(|id| id == graph.id()) {
            line.push_str(" [draft saved]");
        }
        println!("{}", line);
    }
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FlowSpec);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_check(spec_path: &Path) -> CliResult<()> {
    let spec_json = fs::read_to_string(spec_path)?;
    let spec: FlowSpec = serde_json::from_str(&spec_json)?;
    let graph = QuestionGraph::new(spec)?;
    let longest = total_steps(&graph, &flow_spec::FieldStore::new());
    println!(
        "Flow '{}' is valid: {} questions, at most {} steps",
        graph.id(),
        graph.len(),
        longest
    );
    Ok(())
}

fn run_validate(ctx: &AppContext, flow: &str, answers_path: &Path) -> CliResult<()> {
    let answers_json = fs::read_to_string(answers_path)?;
    let value = parse_host_result(&flow_host::validate_answers(
        ctx.catalog(),
        flow,
        &answers_json,
    ))?;
    let result: ValidationResult = serde_json::from_value(value)?;
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!(
                "  {} - {}",
                error.path.as_deref().unwrap_or("<unknown>"),
                error.message
            );
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_progress(ctx: &AppContext, flow: &str, answers_path: &Path) -> CliResult<()> {
    let answers_json = fs::read_to_string(answers_path)?;
    let value = parse_host_result(&flow_host::next(ctx.catalog(), flow, &answers_json))?;
    let progress = &value["progress"];
    println!(
        "Step {} of {} ({} answered)",
        progress["step"], progress["total"], progress["answered"]
    );
    match value["next_question_id"].as_str() {
        Some(question) => println!("Next question: {}", question),
        None => println!("Flow complete"),
    }
    Ok(())
}

fn run_drafts(ctx: &AppContext, action: DraftsCommand) -> CliResult<()> {
    let drafts = ctx.drafts();
    match action {
        DraftsCommand::List => {
            for flow in drafts.list()? {
                match drafts.load(&flow)? {
                    Some(draft) => println!(
                        "{}\tsaved {}\tat {}",
                        flow,
                        draft.saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        draft.state.current.key().unwrap_or("(complete)")
                    ),
                    None => println!("{}", flow),
                }
            }
        }
        DraftsCommand::Show { flow } => match drafts.load(&flow)? {
            Some(draft) => println!("{}", draft.to_json()?),
            None => return Err(format!("no draft saved for '{}'", flow).into()),
        },
        DraftsCommand::Discard { flow } => {
            drafts.discard(&flow)?;
            println!("Discarded draft for '{}'", flow);
        }
    }
    Ok(())
}

fn parse_host_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_wizard(
    ctx: &AppContext,
    flow: &str,
    resume: bool,
    verbose: bool,
    answers_json: bool,
    format: RenderMode,
) -> CliResult<()> {
    let mut lines = io::stdin().lock().lines();
    // Starting fresh autosaves over the old draft, so that needs a yes first.
    if !resume && ctx.drafts().load(flow).ok().flatten().is_some() {
        print!(
            "A saved draft exists for '{}'. Start over and replace it? [y/N] ",
            flow
        );
        io::stdout().flush()?;
        let reply = lines.next().transpose()?.unwrap_or_default();
        if !matches!(reply.trim().to_lowercase().as_str(), "y" | "yes") {
            println!();
            println!("Draft kept; rerun with --resume to continue it.");
            return Ok(());
        }
    }
    let mut session = ctx.open(flow, resume)?;
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);

    loop {
        let payload = session.render_payload();
        presenter.show_header(&payload);
        if format == RenderMode::Json {
            println!(
                "JSON UI:\n{}",
                serde_json::to_string_pretty(&render_json_ui(&payload))?
            );
        }
        presenter.show_status(&payload);
        let question = match payload.current_question() {
            Some(question) if needs_input(&payload) => question,
            _ => return leave(ctx, session, ExitMode::Discard),
        };
        presenter.show_prompt(&PromptContext::new(question, &payload.progress));
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            println!("Input closed; draft saved.");
            return leave(ctx, session, ExitMode::Save);
        };
        let line = line?;

        let outcome = match parse_input(question, &line) {
            Ok(Input::Answer(value)) => session.submit(value),
            Ok(Input::Command(WizardCommand::Skip)) => session.skip(),
            Ok(Input::Command(WizardCommand::Back)) => {
                if let Err(err) = session.back() {
                    presenter.show_flow_error(&err);
                }
                continue;
            }
            Ok(Input::Command(WizardCommand::Save)) => {
                println!("Draft saved; rerun with --resume to continue.");
                return leave(ctx, session, ExitMode::Save);
            }
            Ok(Input::Command(WizardCommand::Quit)) => {
                println!("Wizard aborted; draft discarded.");
                return leave(ctx, session, ExitMode::Discard);
            }
            Err(err) => {
                presenter.show_parse_error(&err);
                continue;
            }
        };

        match outcome {
            Ok(SessionStep::Asking(_)) => {}
            Ok(SessionStep::Completed(answers)) => {
                presenter.show_completion(&answers);
                ctx.leave_flow();
                return Ok(());
            }
            Err(err) => presenter.show_flow_error(&err),
        }
    }
}

fn leave(ctx: &AppContext, session: FlowSession, mode: ExitMode) -> CliResult<()> {
    let result = session.exit(mode);
    ctx.leave_flow();
    result?;
    Ok(())
}

/// In-prompt commands, typed with a leading colon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WizardCommand {
    Back,
    Skip,
    Save,
    Quit,
}

#[derive(Debug, PartialEq)]
enum Input {
    Answer(Value),
    Command(WizardCommand),
}

fn parse_input(question: &RenderQuestion, raw: &str) -> Result<Input, AnswerParseError> {
    let trimmed = raw.trim();
    let Some(command) = trimmed.strip_prefix(':') else {
        return parse_answer(question, trimmed).map(Input::Answer);
    };
    let command = match command.to_lowercase().as_str() {
        "back" | "b" => WizardCommand::Back,
        "skip" | "s" => WizardCommand::Skip,
        "save" => WizardCommand::Save,
        "quit" | "q" | "exit" => WizardCommand::Quit,
        other => {
            return Err(AnswerParseError::new(
                format!("Unknown command ':{}'.", other),
                Some("commands are :back, :skip, :save, :quit".to_string()),
            ));
        }
    };
    Ok(Input::Command(command))
}

fn parse_answer(question: &RenderQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    if raw.is_empty() {
        if let Some(current) = question.current_value.as_ref().filter(|value| !value.is_null()) {
            return Ok(current.clone());
        }
        if !question.required {
            return Ok(Value::Null);
        }
        return Err(AnswerParseError::new(
            "This question requires an answer.",
            None,
        ));
    }

    match question.kind {
        QuestionKind::SingleChoice => parse_choice(question, raw).map(Value::String),
        QuestionKind::MultiChoice => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse_choice(question, item).map(Value::String))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        QuestionKind::FreeText | QuestionKind::File => Ok(Value::String(raw.to_string())),
        QuestionKind::Group => parse_group(question, raw),
    }
}

/// Matches a choice by name (case-insensitive) or by its 1-based number.
fn parse_choice(question: &RenderQuestion, raw: &str) -> Result<String, AnswerParseError> {
    let choices = question.choices.as_deref().unwrap_or_default();
    if let Some(choice) = choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
    {
        return Ok(choice.clone());
    }
    if let Ok(number) = raw.parse::<usize>()
        && let Some(choice) = number.checked_sub(1).and_then(|index| choices.get(index))
    {
        return Ok(choice.clone());
    }
    Err(AnswerParseError::new(
        format!("Choose one of: {}.", choices.join(", ")),
        Some(format!("allowed values: {}", choices.join(", "))),
    ))
}

fn parse_group(question: &RenderQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    if raw.starts_with('{') {
        return match serde_json::from_str::<Value>(raw) {
            Ok(value) if value.is_object() => Ok(value),
            Ok(_) => Err(AnswerParseError::new(
                "Group answers must be a JSON object.",
                None,
            )),
            Err(err) => Err(AnswerParseError::new(
                "Invalid JSON object.",
                Some(err.to_string()),
            )),
        };
    }

    let mut fields = Map::new();
    for pair in raw.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(AnswerParseError::new(
                format!("Expected field=value, got '{}'.", pair),
                None,
            ));
        };
        let key = key.trim();
        let Some(field) = question.fields.iter().find(|field| field.id == key) else {
            let known = question
                .fields
                .iter()
                .map(|field| field.id.as_str())
                .collect::<Vec<_>>();
            return Err(AnswerParseError::new(
                format!("Unknown field '{}'.", key),
                Some(format!("fields: {}", known.join(", "))),
            ));
        };
        let value = parse_answer(field, value.trim())?;
        fields.insert(key.to_string(), value);
    }
    Ok(Value::Object(fields))
}
