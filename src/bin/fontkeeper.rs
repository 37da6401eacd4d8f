//! Fontkeeper command line
//!
//! Edits text in PDFs while keeping the original fonts, and reports every
//! font that could not be kept.
//!
//! Usage:
//!   fontkeeper edit-text in.pdf out.pdf --content ALCANTARA --new-content ALCÂNTARA
//!   fontkeeper fonts in.pdf
//!   fontkeeper merge out.pdf a.pdf b.pdf

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdf_fontkeeper::editor::{Alignment, EditRequest, EditSession, FontRequirementReport, Selector, StyleOverrides};
use pdf_fontkeeper::engine::pages::{self, DocumentInfo};
use pdf_fontkeeper::engine::PdfDocument;
use pdf_fontkeeper::{Color, EditConfig, Error, Result};

const USAGE: &str = "\
Usage: fontkeeper <command> [options]

Commands:
  edit-text <in> <out> --new-content TEXT (--id ID | --content TEXT)
            [--all-occurrences] [--font-name NAME] [--font-size PT]
            [--color #rrggbb] [--rotation DEG] [--x X] [--y Y]
            [--align left|center|right] [--pad]
            [--strict-fonts] [--force] [--config FILE] [--verbose]
  fonts <in>                         List fonts and how they resolve
  merge <out> <in>...                Merge PDFs in order
  delete-pages <in> <out> --pages 1,3-4
  split <in> --ranges 1-2,3 --prefix NAME
  edit-meta <in> <out> [--title T] [--author A] [--subject S]
            [--keywords K] [--creator C] [--producer P]

Exit status: 0 on success, 1 on error, strict font block or no match, 2 on usage error.";

/// Command line problem, reported with the usage text.
struct UsageError(String);

struct EditTextArgs {
    input: PathBuf,
    output: PathBuf,
    selector: Selector,
    new_content: String,
    overrides: StyleOverrides,
    all_occurrences: bool,
    strict_fonts: bool,
    force: bool,
    config: Option<PathBuf>,
    verbose: bool,
}

enum Command {
    EditText(Box<EditTextArgs>),
    Fonts { input: PathBuf },
    Merge { output: PathBuf, inputs: Vec<PathBuf> },
    DeletePages { input: PathBuf, output: PathBuf, pages: String },
    Split { input: PathBuf, ranges: String, prefix: String },
    EditMeta { input: PathBuf, output: PathBuf, info: DocumentInfo },
    Help,
}

/// Positional arguments and `--flag value` options.
struct Parsed {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl Parsed {
    fn parse(args: &[String], switches: &[&str]) -> std::result::Result<Self, UsageError> {
        let mut positional = Vec::new();
        let mut options = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if let Some(flag) = arg.strip_prefix("--") {
                if switches.contains(&flag) {
                    options.push((flag.to_string(), None));
                } else {
                    i += 1;
                    let value = args
                        .get(i)
                        .ok_or_else(|| UsageError(format!("Option --{} needs a value", flag)))?;
                    options.push((flag.to_string(), Some(value.clone())));
                }
            } else if arg == "-v" {
                options.push(("verbose".to_string(), None));
            } else {
                positional.push(arg.clone());
            }
            i += 1;
        }
        Ok(Self { positional, options })
    }

    fn flag(&self, name: &str) -> bool {
        self.options.iter().any(|(flag, _)| flag == name)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(flag, _)| flag == name)
            .and_then(|(_, value)| value.as_deref())
    }

    fn number(&self, name: &str) -> std::result::Result<Option<f32>, UsageError> {
        self.value(name)
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|_| UsageError(format!("--{} expects a number, got '{}'", name, v)))
            })
            .transpose()
    }

    fn positional(&self, index: usize, what: &str) -> std::result::Result<PathBuf, UsageError> {
        self.positional
            .get(index)
            .map(PathBuf::from)
            .ok_or_else(|| UsageError(format!("Missing {}", what)))
    }

    fn reject_unknown(&self, known: &[&str]) -> std::result::Result<(), UsageError> {
        match self.options.iter().find(|(flag, _)| !known.contains(&flag.as_str())) {
            Some((flag, _)) => Err(UsageError(format!("Unknown option --{}", flag))),
            None => Ok(()),
        }
    }
}

fn parse(args: &[String]) -> std::result::Result<Command, UsageError> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    match name.as_str() {
        "edit-text" => parse_edit_text(rest),
        "fonts" => {
            let parsed = Parsed::parse(rest, &["verbose"])?;
            parsed.reject_unknown(&["verbose"])?;
            Ok(Command::Fonts {
                input: parsed.positional(0, "input PDF")?,
            })
        },
        "merge" => {
            let parsed = Parsed::parse(rest, &["verbose"])?;
            parsed.reject_unknown(&["verbose"])?;
            let output = parsed.positional(0, "output PDF")?;
            let inputs: Vec<PathBuf> = parsed.positional[1..].iter().map(PathBuf::from).collect();
            if inputs.len() < 2 {
                return Err(UsageError("merge needs at least two input PDFs".to_string()));
            }
            Ok(Command::Merge { output, inputs })
        },
        "delete-pages" => {
            let parsed = Parsed::parse(rest, &["verbose"])?;
            parsed.reject_unknown(&["verbose", "pages"])?;
            Ok(Command::DeletePages {
                input: parsed.positional(0, "input PDF")?,
                output: parsed.positional(1, "output PDF")?,
                pages: parsed
                    .value("pages")
                    .ok_or_else(|| UsageError("--pages is required".to_string()))?
                    .to_string(),
            })
        },
        "split" => {
            let parsed = Parsed::parse(rest, &["verbose"])?;
            parsed.reject_unknown(&["verbose", "ranges", "prefix"])?;
            let input = parsed.positional(0, "input PDF")?;
            let ranges = parsed
                .value("ranges")
                .ok_or_else(|| UsageError("--ranges is required".to_string()))?
                .to_string();
            let prefix = match parsed.value("prefix") {
                Some(prefix) => prefix.to_string(),
                None => input.with_extension("").to_string_lossy().into_owned(),
            };
            Ok(Command::Split { input, ranges, prefix })
        },
        "edit-meta" => {
            let keys = ["title", "author", "subject", "keywords", "creator", "producer"];
            let parsed = Parsed::parse(rest, &["verbose"])?;
            let mut known = keys.to_vec();
            known.push("verbose");
            parsed.reject_unknown(&known)?;
            let mut info = DocumentInfo::new();
            if let Some(v) = parsed.value("title") {
                info = info.title(v);
            }
            if let Some(v) = parsed.value("author") {
                info = info.author(v);
            }
            if let Some(v) = parsed.value("subject") {
                info = info.subject(v);
            }
            if let Some(v) = parsed.value("keywords") {
                info = info.keywords(v);
            }
            if let Some(v) = parsed.value("creator") {
                info = info.creator(v);
            }
            if let Some(v) = parsed.value("producer") {
                info = info.producer(v);
            }
            Ok(Command::EditMeta {
                input: parsed.positional(0, "input PDF")?,
                output: parsed.positional(1, "output PDF")?,
                info,
            })
        },
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(UsageError(format!("Unknown command '{}'", other))),
    }
}

fn parse_edit_text(rest: &[String]) -> std::result::Result<Command, UsageError> {
    let switches = ["all-occurrences", "pad", "strict-fonts", "force", "verbose"];
    let parsed = Parsed::parse(rest, &switches)?;
    parsed.reject_unknown(&[
        "all-occurrences",
        "pad",
        "strict-fonts",
        "force",
        "verbose",
        "new-content",
        "id",
        "content",
        "font-name",
        "font-size",
        "color",
        "rotation",
        "x",
        "y",
        "align",
        "config",
    ])?;

    let selector = match (parsed.value("id"), parsed.value("content")) {
        (Some(id), None) => Selector::Id(id.to_string()),
        (None, Some(text)) => Selector::Content(text.to_string()),
        _ => return Err(UsageError("Give exactly one of --id or --content".to_string())),
    };
    let new_content = parsed
        .value("new-content")
        .ok_or_else(|| UsageError("--new-content is required".to_string()))?
        .to_string();

    let mut overrides = StyleOverrides::new();
    overrides.font_name = parsed.value("font-name").map(str::to_string);
    overrides.font_size = parsed.number("font-size")?;
    overrides.rotation = parsed.number("rotation")?;
    overrides.x = parsed.number("x")?;
    overrides.y = parsed.number("y")?;
    overrides.color = parsed
        .value("color")
        .map(|hex| Color::from_hex(hex).map_err(|e| UsageError(e.to_string())))
        .transpose()?;
    overrides.alignment = parsed
        .value("align")
        .map(|align| align.parse::<Alignment>().map_err(|e| UsageError(e.to_string())))
        .transpose()?;
    overrides.pad = parsed.flag("pad");

    Ok(Command::EditText(Box::new(EditTextArgs {
        input: parsed.positional(0, "input PDF")?,
        output: parsed.positional(1, "output PDF")?,
        selector,
        new_content,
        overrides,
        all_occurrences: parsed.flag("all-occurrences"),
        strict_fonts: parsed.flag("strict-fonts"),
        force: parsed.flag("force"),
        config: parsed.value("config").map(PathBuf::from),
        verbose: parsed.flag("verbose"),
    })))
}

fn confirm_degraded(report: &FontRequirementReport) -> bool {
    eprint!(
        "{} font(s) could not be preserved exactly. Keep the output anyway? [y/N] ",
        report.len()
    );
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn edit_text(args: &EditTextArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => EditConfig::from_json_file(path)?,
        None => EditConfig::new(),
    };
    let config = config
        .clone()
        .with_strict_fonts(config.strict_fonts || args.strict_fonts)
        .with_force(config.force || args.force)
        .with_all_occurrences(config.all_occurrences || args.all_occurrences);

    let mut session = EditSession::open(&args.input, config)?;
    let request = EditRequest {
        selector: args.selector.clone(),
        new_content: args.new_content.clone(),
        overrides: args.overrides.clone(),
    };
    let outcomes = session.apply(&request)?;
    for outcome in &outcomes {
        println!(
            "Page {}: '{}' -> '{}' ({} via {}{})",
            outcome.page + 1,
            outcome.original_content,
            outcome.result.content,
            outcome.result.font_name,
            outcome.engine,
            if outcome.font_degraded { ", font degraded" } else { "" }
        );
    }
    for failure in session.failures() {
        eprintln!("Page {}: run {} unchanged: {}", failure.page + 1, failure.run_id, failure.error);
    }
    if outcomes.is_empty() {
        let reason = session
            .failures()
            .iter()
            .map(|f| f.error.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::MutationEngineFailed {
            page: session.failures().first().map(|f| f.page).unwrap_or(0),
            run_id: session.failures().first().map(|f| f.run_id.clone()).unwrap_or_default(),
            reason,
        });
    }

    println!("{}", session.report().render());
    session.finish(&args.output, confirm_degraded)?;
    println!("Saved {}", args.output.display());
    if args.verbose {
        println!("{}", session.audit()?.to_json()?);
    }
    Ok(())
}

fn list_fonts(input: &Path) -> Result<()> {
    let document = PdfDocument::open(input)?;
    let mut session = EditSession::new(document, EditConfig::new())?;
    let resolutions = session.font_resolutions();
    if resolutions.is_empty() {
        println!("No fonts referenced.");
        return Ok(());
    }
    println!("{:<36} {:<9} {:<9} RESOLVED", "FONT", "EMBEDDED", "QUALITY");
    for (font, resolution) in resolutions {
        println!(
            "{:<36} {:<9} {:<9} {}",
            font.normalized_name,
            if font.embedded_bytes().is_some() { "yes" } else { "no" },
            resolution.quality.to_string(),
            resolution.resolved_name()
        );
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::EditText(args) => edit_text(&args),
        Command::Fonts { input } => list_fonts(&input),
        Command::Merge { output, inputs } => {
            let count = pages::merge_files(&inputs, &output)?;
            println!("Merged {} file(s), {} page(s) into {}", inputs.len(), count, output.display());
            Ok(())
        },
        Command::DeletePages { input, output, pages: selection } => {
            let count = pages::load(&input)?.get_pages().len();
            let selected = pages::parse_page_ranges(&selection, count)?;
            let remaining = pages::delete_pages_file(&input, &selected, &output)?;
            println!("Deleted {} page(s), {} remain in {}", selected.len(), remaining, output.display());
            Ok(())
        },
        Command::Split { input, ranges, prefix } => {
            let count = pages::load(&input)?.get_pages().len();
            let groups = ranges
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| pages::parse_page_ranges(part, count))
                .collect::<Result<Vec<_>>>()?;
            for path in pages::split_file(&input, &groups, &prefix)? {
                println!("Wrote {}", path.display());
            }
            Ok(())
        },
        Command::EditMeta { input, output, info } => {
            pages::edit_metadata_file(&input, &info, &output)?;
            println!("Saved {}", output.display());
            Ok(())
        },
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        },
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = args.iter().any(|arg| arg == "--verbose" || arg == "-v");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" }))
        .init();

    let command = match parse(&args) {
        Ok(command) => command,
        Err(UsageError(message)) => {
            eprintln!("Error: {}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        },
    };
    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(1)
        },
    }
}
