use logtee::cli::Cli;

#[tokio::main]
async fn main() {
    // Initialize CLI and run the pipeline
    if let Err(e) = Cli::run().await {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}
