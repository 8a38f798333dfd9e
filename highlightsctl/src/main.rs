use clap::Parser;

fn main() {
    highlightsctl::init_tracing();
    let cli = highlightsctl::Cli::parse();
    if let Err(err) = highlightsctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
