use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "coffan", version, about = "Inspect COFF executables, checksum and export flash images")]
pub struct Args {
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Sections to checksum or export; all sections when omitted.
    #[arg(value_name = "SECTION")]
    pub sections: Vec<String>,

    /// Print CRC-32 and word checksum of the assembled flash image.
    #[arg(short = 'c', long = "checksum")]
    pub checksum: bool,

    /// Write the selected sections as a Motorola S19 file.
    #[arg(short = 'o', long = "output", value_name = "S19")]
    pub output: Option<String>,

    /// Fail on section names that are not in the file.
    #[arg(long = "strict")]
    pub strict: bool,

    /// Terminate S-record lines with CR LF instead of LF.
    #[arg(long = "crlf")]
    pub crlf: bool,

    /// Skip the file info and section table.
    #[arg(long = "quiet", short = 'q')]
    pub quiet: bool,

    /// Enable debug logging (RUST_LOG overrides).
    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::CommandFactory;

    #[test]
    fn every_option_has_help_text() {
        let command = Args::command();
        for arg in command.get_arguments() {
            if arg.is_positional() || arg.get_id() == "help" || arg.get_id() == "version" {
                continue;
            }
            assert!(arg.get_help().is_some(), "--{} has no help", arg.get_id());
        }
    }
}
