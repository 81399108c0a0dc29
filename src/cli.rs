use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use report_builder::chart::{ChartKind, ChartRequest, PngChartRenderer};
use report_builder::config::{self, AppConfig};
use report_builder::dataset::LoadOptions;
use report_builder::error::ReportError;
use report_builder::report::ExportFormat;
use report_builder::session::ReportSession;
use report_builder::summary::{OpenAiSummaryService, SummaryOutcome, Summarizer};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "report-builder",
    version,
    about = "Statistics, charts and AI summaries for delimited data files"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct InputArgs {
    /// Delimited text file to read, or `-` for standard input
    pub input: PathBuf,

    /// Character encoding label (utf-8, latin1, windows-1252, ...). Detected when omitted.
    #[arg(long)]
    pub encoding: Option<String>,

    /// Field delimiter. Sniffed among tab, semicolon, comma and pipe when omitted.
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

impl InputArgs {
    fn open(&self) -> Result<ReportSession> {
        let mut options = LoadOptions::default();
        if let Some(label) = &self.encoding {
            options = options.with_encoding(label);
        }
        if let Some(delimiter) = self.delimiter {
            options = options.with_delimiter(delimiter);
        }
        Ok(ReportSession::open(&self.input, &options)?)
    }
}

#[derive(Args)]
pub struct ChartFieldArgs {
    /// X-axis field (line, bar, scatter)
    #[arg(long)]
    pub x: Option<String>,

    /// Y-axis field; repeat for several series (line, bar)
    #[arg(long)]
    pub y: Vec<String>,

    /// Category field (pie)
    #[arg(long)]
    pub category: Option<String>,

    /// Value field (pie)
    #[arg(long)]
    pub value: Vec<String>,

    /// Series color: #rrggbb, #rgb or a color name
    #[arg(long)]
    pub color: Option<String>,

    /// Chart title. Defaults to "<Kind> Chart".
    #[arg(long)]
    pub chart_title: Option<String>,
}

impl ChartFieldArgs {
    fn request(&self, kind: ChartKind) -> ChartRequest {
        ChartRequest {
            kind,
            x: self.x.clone(),
            y: self.y.clone(),
            category: self.category.clone(),
            value: self.value.clone(),
            color: self.color.clone(),
            title: self.chart_title.clone(),
        }
    }
}

#[derive(Args)]
pub struct SummaryArgs {
    /// Question for the summary to answer
    #[arg(short, long)]
    pub question: Option<String>,

    /// Rows sent as a sample alongside the statistics (max 50)
    #[arg(long)]
    pub sample_rows: Option<usize>,

    /// API key for the summarization service
    #[arg(long, env = config::API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name, overriding the config file
    #[arg(long)]
    pub model: Option<String>,
}

impl SummaryArgs {
    fn summarizer(&self, config: &AppConfig) -> Result<Summarizer<OpenAiSummaryService>, ReportError> {
        let key = config::resolve_credential(self.api_key.clone().map(|k| SecretString::new(k.into())))?;
        let mut ai = config.ai.clone();
        if let Some(model) = &self.model {
            ai.model.clone_from(model);
        }
        let timeout = ai.timeout();
        Ok(Summarizer::new(OpenAiSummaryService::new(&key, ai)).with_timeout(timeout))
    }

    fn sample_rows(&self, config: &AppConfig) -> usize {
        self.sample_rows.unwrap_or(config.report.sample_rows)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the first rows, column kinds and chart field suggestions
    Preview {
        #[command(flatten)]
        input: InputArgs,

        /// Rows to show. Defaults to the config value (5).
        #[arg(short = 'n', long)]
        rows: Option<usize>,
    },
    /// Descriptive statistics of every numeric column
    Stats {
        #[command(flatten)]
        input: InputArgs,

        /// Print JSON instead of a text grid
        #[arg(long)]
        json: bool,
    },
    /// Render a chart to a PNG file
    Chart {
        #[command(flatten)]
        input: InputArgs,

        /// Chart kind: line, bar, scatter or pie
        #[arg(long)]
        kind: ChartKind,

        #[command(flatten)]
        fields: ChartFieldArgs,

        /// PNG file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Ask the summarization service to describe the dataset
    Summarize {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Build the full report: statistics, optional chart and summary
    Report {
        #[command(flatten)]
        input: InputArgs,

        /// Report file to write
        #[arg(short, long)]
        output: PathBuf,

        /// html or markdown. Inferred from the output extension, then the config.
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Report title
        #[arg(long)]
        title: Option<String>,

        /// Include a chart of this kind
        #[arg(long)]
        chart: Option<ChartKind>,

        #[command(flatten)]
        fields: ChartFieldArgs,

        /// Skip the summary; no API key is needed
        #[arg(long)]
        no_summary: bool,

        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("delimiter must be a single ASCII character, got '{s}'")),
        },
    }
}

pub async fn run_command(command: Commands) -> Result<()> {
    let config = config::load_app_config();

    match command {
        Commands::Preview { input, rows } => handle_preview(&input, rows.unwrap_or(config.report.preview_rows)),
        Commands::Stats { input, json } => handle_stats(&input, json),
        Commands::Chart {
            input,
            kind,
            fields,
            output,
        } => handle_chart(&input, &fields.request(kind), &output),
        Commands::Summarize { input, summary } => handle_summarize(&input, &summary, &config).await,
        Commands::Report {
            input,
            output,
            format,
            title,
            chart,
            fields,
            no_summary,
            summary,
        } => {
            let format = format
                .or_else(|| ExportFormat::from_path(&output))
                .unwrap_or(config.report.default_format);
            let plan = ReportPlan {
                output: &output,
                format,
                title: title.as_deref(),
                chart: chart.map(|kind| fields.request(kind)),
                summary: (!no_summary).then_some(&summary),
            };
            handle_report(&input, plan, &config).await
        }
        Commands::Config { action } => handle_config(action, &config),
    }
}

fn print_warnings(session: &ReportSession) {
    for warning in session.warnings() {
        println!("warning: {warning}");
    }
}

fn handle_preview(input: &InputArgs, rows: usize) -> Result<()> {
    let session = input.open()?;
    let table = session.table();

    println!(
        "{}: {} rows x {} columns\n",
        session.source(),
        table.row_count(),
        table.column_count()
    );
    println!("{}\n", table.preview(rows));

    println!("Column kinds:");
    for column in table.columns() {
        println!("  {:<24} {}", column.name(), column.kind());
    }

    let suggestions = table.field_suggestions();
    println!("\nChart fields:");
    println!("  x (any):            {}", suggestions.any.join(", "));
    println!("  y / pie value:      {}", or_none(&suggestions.numeric));
    println!("  pie category:       {}", or_none(&suggestions.categorical));
    Ok(())
}

fn or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}

fn handle_stats(input: &InputArgs, json: bool) -> Result<()> {
    let mut session = input.open()?;
    let stats = session.statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
    } else {
        println!("{}", stats.render_text());
    }
    print_warnings(&session);
    Ok(())
}

fn handle_chart(input: &InputArgs, request: &ChartRequest, output: &Path) -> Result<()> {
    let mut session = input.open()?;
    let chart = session.chart(request, &PngChartRenderer::default())?;
    std::fs::write(output, &chart.image.png)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} to {}", chart.spec.title, output.display());
    if let Some(axes) = chart.image.axis_caption() {
        println!("  {axes}");
    }
    if !chart.image.x_categories.is_empty() {
        println!("  along x: {}", chart.image.x_categories.join(", "));
    }
    for entry in &chart.image.legend {
        println!("  {} {}", entry.color.hex(), entry.label);
    }
    print_warnings(&session);
    Ok(())
}

async fn handle_summarize(input: &InputArgs, args: &SummaryArgs, config: &AppConfig) -> Result<()> {
    let summarizer = args.summarizer(config)?;
    let mut session = input.open()?;
    let sample_rows = args.sample_rows(config);

    match session
        .summarize(&summarizer, args.question.as_deref(), sample_rows)
        .await
    {
        SummaryOutcome::Completed(text) => println!("{text}"),
        SummaryOutcome::Failed(err) => return Err(ReportError::from(err.clone()).into()),
    }
    Ok(())
}

struct ReportPlan<'a> {
    output: &'a Path,
    format: ExportFormat,
    title: Option<&'a str>,
    chart: Option<ChartRequest>,
    summary: Option<&'a SummaryArgs>,
}

async fn handle_report(input: &InputArgs, plan: ReportPlan<'_>, config: &AppConfig) -> Result<()> {
    // The credential is a precondition; check it before doing any work.
    let summarizer = plan.summary.map(|args| args.summarizer(config)).transpose()?;
    let mut session = input.open()?;
    session.statistics();

    if let Some(request) = &plan.chart {
        session.chart(request, &PngChartRenderer::default())?;
    }

    if let (Some(summarizer), Some(args)) = (&summarizer, plan.summary) {
        let outcome = session
            .summarize(summarizer, args.question.as_deref(), args.sample_rows(config))
            .await;
        if let SummaryOutcome::Failed(err) = outcome {
            println!("warning: {}", ReportError::from(err.clone()));
        }
    }

    let doc = session.export(plan.title, plan.format, plan.output)?;
    print_warnings(&session);
    println!(
        "Wrote {} report with {} sections to {}",
        plan.format,
        doc.sections.len(),
        plan.output.display()
    );
    Ok(())
}

fn handle_config(action: ConfigAction, config: &AppConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            if let Some(path) = config::get_config_path() {
                println!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Init { force } => {
            let path = config::get_config_path().context("Cannot determine the config directory")?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
            }
            let path = config::save_app_config(&AppConfig::default())?;
            println!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}
