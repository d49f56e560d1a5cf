use anyhow::{Result, bail};
use clap::Args;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use spira_core::SpiraProvider;
use spira_core::error::ErrorCode;
use spira_core::notify::{FailureNotice, TreeChange};

use crate::cmd::load_configured;
use crate::cmd::tree::{TreeView, print_tree};
use crate::output::{CliError, OutputMode, render_error};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Stop after this many published refreshes.
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Milliseconds between scheduler ticks.
    #[arg(long, default_value_t = 250)]
    pub tick_ms: u64,
}

pub fn run_watch(args: &WatchArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let config = load_configured(config_flag, output)?;
    match config.refresh_interval() {
        Some(every) => tracing::info!(interval_ms = every.as_millis(), "watching"),
        None => tracing::info!("refresh timer disabled; showing the first refresh only"),
    }
    let mut provider = SpiraProvider::connect(config);

    let dirty = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dirty);
    provider.subscribe(move |change| {
        if *change == TreeChange::Root {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let surfaced: Arc<Mutex<Option<FailureNotice>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&surfaced);
    provider.subscribe_failures(move |notice| {
        if let Ok(mut slot) = sink.lock() {
            *slot = Some(notice.clone());
        }
    });

    provider.refresh(true);
    let tick = Duration::from_millis(args.tick_ms.max(10));
    let mut published = 0_u64;
    let mut last_seen = None;

    loop {
        provider.tick(Instant::now());

        if dirty.swap(false, Ordering::SeqCst) {
            print_tree(&TreeView::from_provider(&provider), output)?;
        }
        if provider.last_published() != last_seen {
            last_seen = provider.last_published();
            published += 1;
        }

        let notice = surfaced.lock().ok().and_then(|mut slot| slot.take());
        if let Some(notice) = notice {
            render_error(output, &CliError::from(&notice))?;
            bail!("{}", notice.message);
        }
        if args.cycles.is_some_and(|limit| published >= limit) {
            return Ok(());
        }
        // Without a deadline nothing further will happen.
        if provider.is_settled() && provider.scheduler().next_due().is_none() {
            if published == 0 {
                render_error(
                    output,
                    &CliError::from_code(ErrorCode::FetchFailed, "refresh failed and the timer is off"),
                )?;
                bail!("{}", ErrorCode::FetchFailed.message());
            }
            return Ok(());
        }

        thread::sleep(tick);
    }
}
