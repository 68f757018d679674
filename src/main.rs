use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = benchmark_logging::Config::from_env()?;
    let sink = config.sink().connect().await?;
    let emitted = benchmark_logging::run(&config, sink.as_ref()).await?;
    tracing::debug!(emitted, "reached max log count");
    Ok(())
}
