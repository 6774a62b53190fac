pub mod cli;
pub mod commands;
pub mod config;
pub mod datemath;
pub mod datetime;
pub mod error;
pub mod event;
pub mod events;
pub mod grid;
pub mod predicate;
pub mod render;
pub mod store;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use error::{
  CalendarError,
  Result
};
pub use grid::{
  CalendarGrid,
  CalendarSettings,
  MonthRef,
  StandardEvent
};
pub use predicate::{
  ConditionName,
  ConditionValue,
  EventPredicate
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting eventgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    store::EventStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open event store \
           at {}",
          data_dir.display()
        )
      })?;

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &store,
    &cfg,
    &mut renderer,
    inv
  )?;

  info!("done");
  Ok(())
}
