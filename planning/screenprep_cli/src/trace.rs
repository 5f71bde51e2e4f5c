use tracing_log::AsTrace;

/// Wires the `-v`/`-q` flags into one tracing subscriber for the process.
pub fn configure_tracing(verbosity: clap_verbosity_flag::Verbosity) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(verbosity.log_level_filter().as_trace())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("{}", error))?;
    Ok(())
}
