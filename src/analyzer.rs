use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::checksum::{ChecksumError, Checksums};
use crate::cli::Args;
use crate::format::{coff, FormatError};
use crate::image::assemble;
use crate::model::{CoffFile, Section, SectionSummary, TargetVariant};
use crate::srec::{LineEnding, SRecordError, SRecordWriter};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Decode(#[from] FormatError),
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    #[error(transparent)]
    Encode(#[from] SRecordError),
    #[error("Sorry, not supported for this COFF object file (version {0:04X})")]
    UnsupportedTarget(u16),
    #[error("section not found: {0}")]
    SectionNotFound(String),
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a successful S19 export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: Vec<String>,
    /// Advisory messages for sections that were left out.
    pub warnings: Vec<String>,
}

/// # Errors
/// Any decode error, see [`coff::decode`].
pub fn decode_file(path: impl AsRef<Path>) -> Result<CoffFile, AnalyzeError> {
    Ok(coff::decode_file(path)?)
}

#[must_use]
pub fn list_sections(file: &CoffFile) -> Vec<SectionSummary> {
    file.sections().iter().map(Section::summary).collect()
}

/// Looks up every name, failing on the first one the file does not contain.
///
/// # Errors
/// Returns `AnalyzeError::SectionNotFound` naming the missing section.
pub fn resolve_sections<'a, S: AsRef<str>>(
    file: &'a CoffFile,
    section_names: &[S],
) -> Result<Vec<&'a Section>, AnalyzeError> {
    section_names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            file.section(name)
                .ok_or_else(|| AnalyzeError::SectionNotFound(name.to_string()))
        })
        .collect()
}

/// Assembles the flash image for the named sections and checksums it.
///
/// # Errors
/// Propagates `ChecksumError` from the checksum engine.
pub fn compute_checksums<S: AsRef<str>>(
    file: &CoffFile,
    section_names: &[S],
) -> Result<Checksums, AnalyzeError> {
    let image = assemble(file, section_names);
    Ok(Checksums::compute(&image)?)
}

/// Writes the named flashable sections to `output` as 16-bit S-records.
///
/// Sections outside memory page 0 are skipped with a warning; unknown names
/// are ignored. Only the word-addressed variant can be exported.
///
/// # Errors
/// `UnsupportedTarget` for other variants (no file is created), `Io` when the
/// output cannot be written.
pub fn export_motorola<S: AsRef<str>>(
    file: &CoffFile,
    section_names: &[S],
    output: impl AsRef<Path>,
    line_ending: LineEnding,
) -> Result<ExportReport, AnalyzeError> {
    if file.variant() != TargetVariant::Coff1 {
        return Err(AnalyzeError::UnsupportedTarget(file.header().version_id));
    }

    let mut writer = SRecordWriter::new(16, file.entry_point())?.with_line_ending(line_ending);
    let mut report = ExportReport::default();
    for name in section_names {
        let name = name.as_ref();
        let Some(section) = file.section(name) else {
            debug!("export: no section named {name}, skipped");
            continue;
        };
        if section.is_flashable() {
            writer.add_section(section);
            report.exported.push(name.to_string());
        } else {
            let message = format!("Section {name} skipped (not text area)");
            warn!("{message}");
            report.warnings.push(message);
        }
    }

    let output = output.as_ref();
    writer.save_to(output).map_err(|source| AnalyzeError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(report)
}

/// Info lines shown for an opened file.
#[must_use]
pub fn describe(file: &CoffFile) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(opt) = file.optional_header() {
        lines.push(format!("EXEC CODE ADDR: {:04X}", opt.exec_code_address));
        lines.push(format!("EXEC CODE SIZE: {}", opt.exec_code_size));
    }
    lines.push(format!("BUILD DATE: {}", file.header().build_date()));
    lines.push(file.header().to_string());
    if let Some(opt) = file.optional_header() {
        lines.push(opt.to_string());
    }
    lines
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let file = coff::decode_file(&args.input)
        .map_err(|err| anyhow::anyhow!("{}: {err}", args.input))?;
    debug!(
        "decoded {}: {:?}, {} section(s)",
        args.input,
        file.variant(),
        file.sections().len()
    );

    let selected: Vec<String> = if args.sections.is_empty() {
        file.sections().iter().map(|s| s.name().to_string()).collect()
    } else {
        args.sections.clone()
    };
    if args.strict {
        resolve_sections(&file, selected.as_slice())?;
    }

    if !args.quiet {
        for line in describe(&file) {
            println!("{line}");
        }
        println!();
        println!("{:<8} {:>4} {:>8} PAGE", "NAME", "ADDR", "SIZE");
        for summary in list_sections(&file) {
            println!("{summary}");
        }
    }

    if args.checksum || !args.sections.is_empty() {
        println!("{}", compute_checksums(&file, selected.as_slice())?);
    }

    if let Some(output) = &args.output {
        let line_ending = if args.crlf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        let report = export_motorola(&file, selected.as_slice(), output, line_ending)?;
        for message in &report.warnings {
            eprintln!("warning: {message}");
        }
        println!(
            "wrote {output}: {} section(s) exported",
            report.exported.len()
        );
    }
    Ok(())
}
