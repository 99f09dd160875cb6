use clap::Parser;

fn main() {
    let args = coffan::cli::Args::parse();
    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    if let Err(err) = coffan::run(args) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
