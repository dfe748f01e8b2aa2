//! `retstat run`: poll until interrupted.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::info;

use retstat_core::Beat;

use crate::cli::RunArgs;
use crate::commands::Settings;
use crate::error::CliError;
use crate::output::JsonLinesPublisher;

pub async fn handle(args: &RunArgs, settings: Settings) -> Result<(), CliError> {
    let sink: Box<dyn Write + Send> = match args.output {
        Some(ref path) => Box::new(OpenOptions::new().create(true).append(true).open(path)?),
        None => Box::new(io::stdout()),
    };
    let publisher = Arc::new(JsonLinesPublisher::new(sink));

    let beat = Arc::new(Beat::new(&settings.sessions, settings.period, publisher).await?);

    let stopper = Arc::clone(&beat);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after in-flight cycles");
            stopper.stop();
        }
    });

    beat.run().await?;
    Ok(())
}
