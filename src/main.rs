//! CLI for bulk Word document assembly.
//!
//! Generates one document per CSV row from a `.docx` template, appends
//! documents to a bundle of Word files, and checks documents against the
//! funding-announcement checklist.

use bulkdocx::{
    append_to_bundle, extract_text, AppendConfig, Attachment, BulkDocxError, Checklist,
    DocumentGenerator, DocxPackage, GeneratorConfig, NamingScheme, PageRasterizer,
    RequiredFieldSet, Result, SubstitutionMode, DOCUMENT_TYPES,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Stdio};
use std::{fs, process};
use tracing_subscriber::EnvFilter;

const EXAMPLE_CSV: &str = "\
grantee_name,grant_number,grantee_street,grantee_citystatezip,award_amount_numerical,convert_numbers_to_words,contact_name,contact_title,contact_number,contact_email,sig_name,sig_title
Example Grantee,12345,123 Example St,\"Example City, ST 12345\",1000,One Thousand,Jane Doe,Director,555-1234,jane.doe@example.com,John Smith,CEO
Another Grantee,67890,456 Another St,\"Another City, ST 67890\",2000,Two Thousand,John Roe,Manager,555-5678,john.roe@example.com,Jane Smith,CFO
";

#[derive(Parser)]
#[command(name = "bulkdocx", version, about = "Bulk Word document assembly")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one document per CSV row and bundle them into a ZIP
    Generate {
        /// Document template (.docx)
        #[arg(short, long)]
        template: PathBuf,

        /// Data file (UTF-8 CSV, first line names the fields)
        #[arg(short, long)]
        data: PathBuf,

        /// Unique name placed at the start of every generated file name
        #[arg(short, long)]
        prefix: String,

        /// Document type used in file names
        #[arg(long, default_value = "Award Letter")]
        doc_type: String,

        /// Field identifying each row in file names
        #[arg(long, default_value = "grantee_name")]
        key_field: String,

        /// Required fields (comma separated); defaults to the grant-letter set
        #[arg(long, value_delimiter = ',')]
        required: Option<Vec<String>>,

        /// Replace fields one after another instead of in a single scan
        #[arg(long)]
        sequential: bool,

        /// Merge footers as well as body and headers
        #[arg(long)]
        footers: bool,

        /// Output archive
        #[arg(short, long, default_value = "documents.zip")]
        output: PathBuf,
    },

    /// Print an example data file
    ExampleCsv,

    /// Append Word documents to every .docx inside a ZIP bundle
    Append {
        /// ZIP file containing Word documents
        #[arg(short, long)]
        bundle: PathBuf,

        /// Documents to append, in order
        #[arg(short, long = "attach", required = true)]
        attachments: Vec<PathBuf>,

        /// The attachments are PDFs; each page is added as a picture
        #[arg(long)]
        pdf: bool,

        /// Resolution (DPI) used to render PDF pages with pdftoppm
        #[arg(long, default_value_t = 150)]
        resolution: u32,

        /// Font set on every run of the updated documents
        #[arg(long, default_value = "Times New Roman")]
        font: String,

        /// Font size in points
        #[arg(long, default_value_t = 12)]
        font_size: u32,

        /// Leave the documents' fonts as they are
        #[arg(long)]
        keep_fonts: bool,

        /// Output bundle
        #[arg(short, long, default_value = "processed_documents.zip")]
        output: PathBuf,
    },

    /// Check documents (.pdf, .docx, .txt) against the FOA checklist
    Check {
        /// Documents to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory to write one `<name>_compliance_results.csv` per document
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Command::Generate {
            template,
            data,
            prefix,
            doc_type,
            key_field,
            required,
            sequential,
            footers,
            output,
        } => {
            let config = GeneratorConfig {
                required_fields: required
                    .map(RequiredFieldSet::new)
                    .unwrap_or_default(),
                substitution: if sequential {
                    SubstitutionMode::Sequential
                } else {
                    SubstitutionMode::SinglePass
                },
                include_footers: footers,
                max_rows: None,
            };
            let naming = NamingScheme::new(prefix, doc_type).with_key_field(key_field);
            run_generate(&template, &data, &naming, config, &output)
        }
        Command::ExampleCsv => {
            print!("{EXAMPLE_CSV}");
            Ok(())
        }
        Command::Append {
            bundle,
            attachments,
            pdf,
            resolution,
            font,
            font_size,
            keep_fonts,
            output,
        } => {
            let config = AppendConfig {
                font: (!keep_fonts).then_some((font, font_size)),
            };
            let rasterizer = pdf.then_some(Pdftoppm { resolution });
            run_append(&bundle, &attachments, rasterizer.as_ref(), &config, &output)
        }
        Command::Check { files, csv_dir } => run_check(&files, csv_dir.as_deref()),
    };

    if let Err(e) = outcome {
        eprintln!("\n❌ Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_generate(
    template: &Path,
    data: &Path,
    naming: &NamingScheme,
    config: GeneratorConfig,
    output: &Path,
) -> Result<()> {
    if !DOCUMENT_TYPES.contains(&naming.document_type.as_str()) {
        println!(
            "ℹ️  Document type '{}' is not one of: {}",
            naming.document_type,
            DOCUMENT_TYPES.join(", ")
        );
    }

    println!("📄 Template: {}", template.display());
    println!("📊 Data:     {}", data.display());
    println!("{}", "─".repeat(60));

    let generator = DocumentGenerator::with_config(template, config)?;
    let csv = fs::read(data)?;
    let report = generator.generate(&csv, naming)?;

    for entry in &report.entries {
        println!("   ✅ {entry}");
    }
    for skipped in &report.skipped {
        println!("   ⚠️  Skipped {skipped}");
    }

    println!("{}", "─".repeat(60));
    println!(
        "📊 {} of {} row(s) generated, {} skipped",
        report.entries.len(),
        report.total_rows,
        report.skipped.len()
    );

    let report = report.require_documents()?;
    fs::write(output, &report.archive)?;
    println!("💾 Saved to: {}", output.display());
    Ok(())
}

fn run_append(
    bundle: &Path,
    attachments: &[PathBuf],
    rasterizer: Option<&Pdftoppm>,
    config: &AppendConfig,
    output: &Path,
) -> Result<()> {
    let mut prepared = Vec::with_capacity(attachments.len());
    for path in attachments {
        let attachment = match rasterizer {
            Some(rasterizer) => Attachment::from_pdf(&fs::read(path)?, rasterizer)?,
            None => DocxPackage::from_path(path)?.into(),
        };
        if let Attachment::Pages(pages) = &attachment {
            println!("   📄 {}: {} page(s)", path.display(), pages.len());
        }
        prepared.push(attachment);
    }

    let outcome = append_to_bundle(&fs::read(bundle)?, &prepared, config)?;

    for name in &outcome.updated {
        println!("   ✅ {name}");
    }
    for name in &outcome.skipped {
        println!("   ⚠️  Could not open {name}, copied unchanged");
    }

    fs::write(output, &outcome.bytes)?;
    println!(
        "💾 {} attachment(s) appended to {} file(s) in {}",
        prepared.len(),
        outcome.updated.len(),
        output.display()
    );
    Ok(())
}

/// Renders pages with poppler's `pdftoppm`, feeding the PDF on stdin.
struct Pdftoppm {
    resolution: u32,
}

impl PageRasterizer for Pdftoppm {
    fn render_page(&self, pdf: &[u8], index: usize) -> Result<Vec<u8>> {
        let page = (index + 1).to_string();
        let resolution = self.resolution.to_string();
        let mut child = Process::new("pdftoppm")
            .args(["-png", "-singlefile", "-r", &resolution, "-f", &page, "-l", &page, "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(pdf)?;
        }
        let out = child.wait_with_output()?;
        if !out.status.success() {
            return Err(BulkDocxError::InvalidDocument(format!(
                "pdftoppm failed on page {page}: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(out.stdout)
    }
}

fn run_check(files: &[PathBuf], csv_dir: Option<&Path>) -> Result<()> {
    let checklist = Checklist::foa_requirements();

    for path in files {
        println!("🔍 Analyzing: {}", path.display());
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BulkDocxError::UnsupportedFormat(path.display().to_string()))?;

        let text = extract_text(name, &fs::read(path)?)?;
        let report = checklist.review(&text, None)?;

        for result in &report.results {
            let mark = if result.compliant { "Yes" } else { "No" };
            println!("   {}: {mark}", result.item);
        }
        println!(
            "   📊 {}/{} item(s) found",
            report.compliant_count(),
            report.results.len()
        );

        if let Some(dir) = csv_dir {
            fs::create_dir_all(dir)?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
            let dest = dir.join(format!("{stem}_compliance_results.csv"));
            fs::write(&dest, report.to_csv()?)?;
            println!("   💾 Saved to: {}", dest.display());
        }
        println!("{}", "─".repeat(60));
    }
    Ok(())
}
