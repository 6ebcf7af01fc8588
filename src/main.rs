//! tradedec - customs declaration extraction CLI
//!
//! Logs go to stderr, results to stdout or the requested output file.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradedec_ocr::compare::{
    build_comparison_table, run_compare_only, run_generation, ExtractOptions, GenerationRequest,
    ReportFormat,
};
use tradedec_ocr::config::{
    resolve_api_key, resolve_ollama_host, CONFLICT_MODEL_B, DEFAULT_OUTPUT_DIR,
    DEFAULT_RENDER_DPI, DEFAULT_TIMEOUT_SECS, GEMINI_DEFAULT_MODEL, VERIFY_DEFAULT_MODEL,
};
use tradedec_ocr::pdf::{
    extract_single_page, extract_text_from_pdf, parse_page_list, save_page_as_jpg,
    PdfiumOpener, PdfiumPageSource, Rotation, Tesseract, TextProfile,
};
use tradedec_ocr::source::get_pdf_file_list;
use tradedec_ocr::verify::{verify_conflicts, verify_field, ConflictModels, ConflictOptions};
use tradedec_ocr::{build_provider, DocumentType, OutputStore, ProviderConfig, ProviderKind};

#[derive(Parser)]
#[command(name = "tradedec", version, about = "Extract and reconcile customs trade declarations from PDFs")]
struct Cli {
    /// Verbose logging, including full prompts and raw model output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract page text, with OCR for pages without a usable text layer
    Text(TextArgs),
    /// Copy one page into a new single-page PDF
    SplitPage {
        input: PathBuf,
        /// 1-based page, `z` for the last page or `rN` counting from the end
        page: String,
        output: PathBuf,
    },
    /// Render one page as a JPEG
    PageImage {
        pdf: PathBuf,
        page: u32,
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_RENDER_DPI)]
        dpi: f32,
    },
    /// Extract structured JSON with a vision model, optionally diffing against another model
    Extract(ExtractArgs),
    /// Side-by-side table of every model output under the output directory
    Compare {
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = ReportFormat::Md)]
        format: ReportFormat,
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// Read a single field off a page and print the verification JSON
    Verify(VerifyArgs),
    /// Verify the fields on which two models disagree
    VerifyConflicts(ConflictArgs),
}

#[derive(Args)]
struct TextArgs {
    pdf: PathBuf,
    /// Pages to extract, e.g. `1,3-5` (default: all)
    #[arg(long)]
    pages: Option<String>,
    /// Pages to turn 90 degrees clockwise before OCR
    #[arg(long)]
    rotate: Option<String>,
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// OCR every page even when it has a text layer
    #[arg(long)]
    ocr: bool,
    /// Tesseract languages (default depends on the profile)
    #[arg(long)]
    lang: Option<String>,
    #[arg(long, value_enum, default_value_t = TextProfile::Pdf2txt)]
    profile: TextProfile,
}

#[derive(Args)]
struct ProviderArgs {
    #[arg(long, value_enum, default_value_t = ProviderKind::Ollama)]
    provider: ProviderKind,
    /// Model name (default depends on the provider)
    #[arg(long)]
    model: Option<String>,
    /// Gemini API key (or GOOGLE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

impl ProviderArgs {
    fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    fn config(&self) -> anyhow::Result<ProviderConfig> {
        Ok(ProviderConfig::new(
            self.provider,
            self.model.clone(),
            resolve_api_key(self.api_key.as_deref()),
            resolve_ollama_host(),
            self.timeout,
        )?)
    }
}

#[derive(Args)]
struct ExtractArgs {
    /// PDF file or directory of PDFs
    input: PathBuf,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long = "type", value_enum, default_value_t = DocumentType::Declaration)]
    doc_type: DocumentType,
    #[command(flatten)]
    provider: ProviderArgs,
    /// Rotate the page image, counter-clockwise degrees (-90 turns it clockwise)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    rotate: Rotation,
    /// Glob on file names when the input is a directory
    #[arg(long)]
    pattern: Option<String>,
    /// Output file, single input only
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Regenerate outputs that already exist
    #[arg(long)]
    overwrite: bool,
    /// Skip the `.md` / `.chi.md` summaries
    #[arg(long)]
    no_md_summary: bool,
    /// Model directory to diff the new outputs against
    #[arg(long)]
    compare: Option<String>,
    /// Diff existing outputs only, without querying a model
    #[arg(long, requires = "compare")]
    compare_only: bool,
    /// Also write the diff report as Markdown
    #[arg(long)]
    md_report: bool,
}

#[derive(Args)]
struct VerifyArgs {
    pdf: PathBuf,
    page: u32,
    /// Chinese form label, dotted English path or English display name
    field: String,
    #[arg(long, default_value = VERIFY_DEFAULT_MODEL)]
    model: String,
    #[arg(long, value_enum, default_value_t = ProviderKind::Ollama)]
    provider: ProviderKind,
    #[arg(long)]
    api_key: Option<String>,
    /// Pages to turn 90 degrees clockwise, e.g. `1` or `1,2`
    #[arg(long)]
    rotate: Option<String>,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

#[derive(Args)]
struct ConflictArgs {
    /// Directory containing the source PDFs
    #[arg(long)]
    pdf_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
    format: ReportFormat,
    #[arg(long)]
    output_file: Option<PathBuf>,
    /// Page to generate from and verify on
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long = "type", value_enum, default_value_t = DocumentType::Declaration)]
    doc_type: DocumentType,
    #[arg(long, value_enum, default_value_t = ProviderKind::Gemini)]
    provider_a: ProviderKind,
    #[arg(long, default_value = GEMINI_DEFAULT_MODEL)]
    model_a: String,
    #[arg(long, value_enum, default_value_t = ProviderKind::Ollama)]
    provider_b: ProviderKind,
    #[arg(long, default_value = CONFLICT_MODEL_B)]
    model_b: String,
    #[arg(long, value_enum, default_value_t = ProviderKind::Ollama)]
    verify_provider: ProviderKind,
    #[arg(long, default_value = VERIFY_DEFAULT_MODEL)]
    verify_model: String,
    #[arg(long)]
    api_key: Option<String>,
    /// Rotation of generated page images, counter-clockwise degrees
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    rotate: Rotation,
    /// Pages to turn 90 degrees clockwise for verification
    #[arg(long)]
    rotate_pages: Option<String>,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    /// Only compare outputs that already exist
    #[arg(long)]
    no_generate: bool,
    /// Regenerate model outputs even when they exist
    #[arg(long)]
    overwrite_generated: bool,
}

fn provider_config(
    kind: ProviderKind,
    model: &str,
    api_key: Option<&str>,
    timeout: u64,
) -> anyhow::Result<ProviderConfig> {
    Ok(ProviderConfig::new(
        kind,
        Some(model.to_string()),
        resolve_api_key(api_key),
        resolve_ollama_host(),
        timeout,
    )?)
}

fn parse_rotate_pages(spec: Option<&str>) -> anyhow::Result<Vec<u32>> {
    Ok(spec.map(parse_page_list).transpose()?.unwrap_or_default())
}

/// Write to `path`, or stdout when `None`
fn output_writer(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

fn run_text(args: TextArgs) -> anyhow::Result<()> {
    let mut options = args.profile.options();
    if let Some(pages) = &args.pages {
        options.pages = Some(parse_page_list(pages)?);
    }
    options.rotate_pages = parse_rotate_pages(args.rotate.as_deref())?;
    options.force_ocr = args.ocr;
    if let Some(lang) = args.lang {
        options.lang = lang;
    }

    let text = extract_text_from_pdf(&args.pdf, &options)?;
    let mut out = output_writer(args.output.as_deref())?;
    out.write_all(text.as_bytes())?;
    if let Some(path) = &args.output {
        tracing::info!(output = %path.display(), "text saved");
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let pdf_files = get_pdf_file_list(&args.input, args.pattern.as_deref())?;
    if pdf_files.is_empty() {
        tracing::warn!(input = %args.input.display(), "no PDF files found");
        return Ok(());
    }
    let store = OutputStore::new(&args.output_dir);

    if args.compare_only {
        let compare = args
            .compare
            .as_deref()
            .context("--compare-only requires --compare")?;
        let summary = run_compare_only(
            &pdf_files,
            &store,
            &args.provider.model_name(),
            args.provider.provider,
            compare,
            args.doc_type,
            args.md_report,
        )?;
        println!("{}", summary.report.banner());
        println!("{summary}");
        return Ok(());
    }

    let provider = build_provider(&args.provider.config()?)?;
    let options = ExtractOptions {
        request: GenerationRequest {
            page: args.page,
            doc_type: args.doc_type,
            rotation: args.rotate,
        },
        overwrite: args.overwrite,
        output: args.output,
        md_summary: !args.no_md_summary,
        compare: args.compare,
        md_report: args.md_report,
    };

    let summary = run_generation(
        &pdf_files,
        &store,
        &PdfiumOpener,
        &Tesseract::default(),
        provider.as_ref(),
        &options,
    )
    .await?;

    if let Some(report) = &summary.report {
        println!("{}", report.banner());
    }
    println!("{summary}");
    Ok(())
}

fn run_compare(output_dir: &Path, format: ReportFormat, output_file: Option<&Path>) -> anyhow::Result<()> {
    let table = build_comparison_table(&OutputStore::new(output_dir));
    if table.is_empty() {
        tracing::warn!(dir = %output_dir.display(), "no processed declaration outputs found");
        return Ok(());
    }

    let mut out = output_writer(output_file)?;
    match format {
        ReportFormat::Md => out.write_all(table.to_markdown().as_bytes())?,
        ReportFormat::Csv => table.write_csv(out)?,
    }
    Ok(())
}

async fn run_verify(args: VerifyArgs) -> anyhow::Result<()> {
    let config = provider_config(args.provider, &args.model, args.api_key.as_deref(), args.timeout)?;
    let provider = build_provider(&config)?;
    let rotate_pages = parse_rotate_pages(args.rotate.as_deref())?;

    let source = PdfiumPageSource::open(&args.pdf)?;
    let result = verify_field(
        &source,
        &Tesseract::default(),
        provider.as_ref(),
        args.page,
        &args.field,
        &rotate_pages,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_verify_conflicts(args: ConflictArgs) -> anyhow::Result<()> {
    let api_key = args.api_key.as_deref();
    let verifier = build_provider(&provider_config(
        args.verify_provider,
        &args.verify_model,
        api_key,
        args.timeout,
    )?)?;

    let generators = if args.no_generate {
        None
    } else {
        Some((
            build_provider(&provider_config(args.provider_a, &args.model_a, api_key, args.timeout)?)?,
            build_provider(&provider_config(args.provider_b, &args.model_b, api_key, args.timeout)?)?,
        ))
    };

    let models = ConflictModels {
        model_a: &args.model_a,
        model_b: &args.model_b,
        generators: generators.as_ref().map(|(a, b)| [a.as_ref(), b.as_ref()]),
        verifier: verifier.as_ref(),
    };
    let options = ConflictOptions {
        pdf_dir: args.pdf_dir,
        request: GenerationRequest {
            page: args.page,
            doc_type: args.doc_type,
            rotation: args.rotate,
        },
        rotate_pages: parse_rotate_pages(args.rotate_pages.as_deref())?,
        overwrite_generated: args.overwrite_generated,
    };

    let report = verify_conflicts(
        &OutputStore::new(&args.output_dir),
        &PdfiumOpener,
        &Tesseract::default(),
        &models,
        &options,
    )
    .await?;

    let mut out = output_writer(args.output_file.as_deref())?;
    match args.format {
        ReportFormat::Csv => report.write_csv(out)?,
        ReportFormat::Md => out.write_all(report.to_markdown().as_bytes())?,
    }
    if let Some(path) = &args.output_file {
        tracing::info!(output = %path.display(), conflicts = report.rows.len(), "results written");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "tradedec_ocr=debug,tradedec=debug"
    } else {
        "tradedec_ocr=info,tradedec=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Text(args) => run_text(args),
        Command::SplitPage {
            input,
            page,
            output,
        } => {
            let page = extract_single_page(&input, &page, &output)?;
            println!("Extracted page {page} to {}", output.display());
            Ok(())
        }
        Command::PageImage {
            pdf,
            page,
            output,
            dpi,
        } => {
            let image = save_page_as_jpg(&pdf, page, &output, dpi)?;
            println!(
                "Saved page {page} as {} ({}x{})",
                output.display(),
                image.width,
                image.height
            );
            Ok(())
        }
        Command::Extract(args) => run_extract(args).await,
        Command::Compare {
            output_dir,
            format,
            output_file,
        } => run_compare(&output_dir, format, output_file.as_deref()),
        Command::Verify(args) => run_verify(args).await,
        Command::VerifyConflicts(args) => run_verify_conflicts(args).await,
    }
}
