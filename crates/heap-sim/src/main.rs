//! Replays allocation scripts against a page-growable heap.
//!
//! ```text
//! $ heap-sim --max-pages 4 script.txt
//! alloc a 100 -> 0x10
//! free a (0x10)
//! ```
//!
//! The command language is described in the `script` module.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::{
    fs,
    io::{self, Read as _, Write as _},
    path::PathBuf,
    process,
};

use argh::FromArgs;
use log::{LevelFilter, debug};
use page_heap::{MAX_PAGES, PagedBuffer};
use snafu::{Report, ResultExt as _, Whatever, ensure_whatever};

use self::sim::Simulator;

mod logger;
mod script;
mod sim;

/// Replay an allocation script against a page-growable heap.
#[derive(Debug, FromArgs)]
struct Args {
    /// number of 64 KiB pages the heap starts with
    #[argh(option, default = "1")]
    initial_pages: usize,
    /// maximum number of pages the heap may grow to
    #[argh(option)]
    max_pages: Option<usize>,
    /// log level: off, error, warn, info, debug or trace
    #[argh(option, default = "LevelFilter::Warn")]
    log_level: LevelFilter,
    /// script to replay; standard input if omitted
    #[argh(positional)]
    script: Option<PathBuf>,
}

fn main() {
    let args: Args = argh::from_env();

    if let Err(err) = run(&args) {
        eprintln!("{}", error_report(err));
        process::exit(1);
    }
}

fn error_report(err: Whatever) -> String {
    format!("Error: {}", Report::from_error(err))
}

fn run(args: &Args) -> Result<(), Whatever> {
    logger::init(args.log_level).whatever_context("failed to install logger")?;

    ensure_whatever!(
        args.initial_pages <= MAX_PAGES,
        "initial pages out of range, initial_pages={}, max={MAX_PAGES}",
        args.initial_pages
    );
    let mut store = PagedBuffer::new(args.initial_pages);
    if let Some(max_pages) = args.max_pages {
        store = store.with_max_pages(max_pages);
    }
    debug!(
        "store: initial_pages={}, max_pages={:?}",
        args.initial_pages, args.max_pages
    );

    let source = read_script(args)?;
    let lines = script::parse(&source).whatever_context("failed to parse script")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    Simulator::new(store)
        .run(&lines, &mut out)
        .whatever_context("script failed")?;
    out.flush().whatever_context("failed to write output")?;

    Ok(())
}

fn read_script(args: &Args) -> Result<String, Whatever> {
    let Some(path) = &args.script else {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .whatever_context("failed to read script from standard input")?;
        return Ok(source);
    };

    fs::read_to_string(path)
        .with_whatever_context(|_| format!("failed to read script, path={}", path.display()))
}
