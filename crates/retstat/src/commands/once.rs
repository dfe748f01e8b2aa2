//! `retstat once`: one stats cycle per server, printed and exited.

use std::sync::Arc;

use tracing::error;

use retstat_core::{Beat, ChannelPublisher};

use crate::cli::{EventFormat, OnceArgs};
use crate::commands::Settings;
use crate::error::CliError;
use crate::output::{print_output, render_json, render_json_lines, render_yaml};

pub async fn handle(args: &OnceArgs, settings: Settings, quiet: bool) -> Result<(), CliError> {
    // Events are returned directly; the publisher is never called.
    let (publisher, _rx) = ChannelPublisher::new();
    let beat = Beat::new(&settings.sessions, settings.period, Arc::new(publisher)).await?;

    let mut events = Vec::new();
    let mut failed = 0_usize;
    for result in beat.run_once().await {
        match result {
            Ok(event) => events.push(event),
            Err(e) => {
                error!(error = %e, "stats cycle failed");
                failed += 1;
            }
        }
    }

    if events.is_empty() {
        return Err(CliError::CyclesFailed { failed });
    }

    let rendered = match args.format {
        EventFormat::Json => render_json(&events)?,
        EventFormat::JsonLines => render_json_lines(&events)?,
        EventFormat::Yaml => render_yaml(&events)?,
    };
    print_output(&rendered, quiet);
    Ok(())
}
