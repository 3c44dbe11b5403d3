use flow_spec::{
    AnswerSet, FlowError, QuestionKind, RenderPayload, RenderQuestion, RenderStatus, StepProgress,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: status, visible questions, error details, help text.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and outcomes for the terminal wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!("Flow: {}", payload.flow_title);
        if self.verbosity.is_verbose()
            && let Some(help) = &payload.help
        {
            println!("Help: {}", help);
        }
        println!("Commands: :back, :skip, :save (keep draft and exit), :quit (discard and exit)");
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &RenderPayload) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!(
            "Status: {} ({} answered, step {} of {})",
            payload.status.as_str(),
            payload.progress.answered,
            payload.progress.step,
            payload.progress.total
        );
        println!("Visible questions:");
        for question in payload.questions.iter().filter(|question| question.visible) {
            let mut entry = format!(" - {} ({})", question.id, question.title);
            if question.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!(
            "Question {} of {}: {}",
            prompt.index, prompt.total, prompt.title
        );
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if !prompt.fields.is_empty() {
            println!("Fields: {}", prompt.fields.join(", "));
        }
        if let Some(current) = &prompt.current {
            println!("Current answer: {} (press enter to keep)", current);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_flow_error(&self, error: &FlowError) {
        match error {
            FlowError::Validation(validation) => {
                eprintln!("Invalid answer: {}", validation.message);
                if self.verbosity.is_verbose()
                    && let Some(path) = &validation.path
                {
                    eprintln!("  at {}", path);
                }
            }
            other => eprintln!("{}", other),
        }
    }

    pub fn show_completion(&self, answer_set: &AnswerSet) {
        println!("Done ✅");
        match answer_set.to_cbor() {
            Ok(bytes) => println!("Answers (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize answers to CBOR: {}", err),
        }
        if self.show_answers_json {
            match answer_set.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub fields: Vec<String>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(question: &RenderQuestion, progress: &StepProgress) -> Self {
        let choices = question.choices.as_deref().unwrap_or_default();
        let current = question
            .current_value
            .as_ref()
            .filter(|value| !value.is_null())
            .map(flow_spec::render::value_to_display);
        Self {
            index: progress.step.max(1),
            total: progress.total.max(progress.step),
            title: question.title.clone(),
            description: question.description.clone(),
            required: question.required,
            hint: kind_hint(question.kind, choices),
            fields: question
                .fields
                .iter()
                .map(|field| {
                    if field.required {
                        format!("{}*", field.id)
                    } else {
                        field.id.clone()
                    }
                })
                .collect(),
            current,
        }
    }
}

fn kind_hint(kind: QuestionKind, choices: &[String]) -> Option<String> {
    match kind {
        QuestionKind::SingleChoice if !choices.is_empty() => {
            Some(format!("({})", choices.join("/")))
        }
        QuestionKind::MultiChoice if !choices.is_empty() => Some(format!(
            "(comma-separated: {})",
            choices.join(", ")
        )),
        QuestionKind::File => Some("(file name or path)".to_string()),
        QuestionKind::Group => Some("(field=value; field=value or a JSON object)".to_string()),
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Whether the payload still waits on the user.
pub fn needs_input(payload: &RenderPayload) -> bool {
    payload.status == RenderStatus::NeedInput
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
