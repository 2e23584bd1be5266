use clap::Parser;

fn main() {
    let cli = telecastctl::Cli::parse();
    if let Err(err) = telecastctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
