// src/main.rs

use flowkeeper::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("flowkeeper error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    // A local `.env` is optional; real environment variables win.
    dotenvy::dotenv().ok();

    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
