use std::path::PathBuf;

use anyhow::Context;
use banner_capture::{
    browser_controller::BrowserController,
    runner::{Runner, RunnerOptions},
    utils::{OUTPUT_PATH, SCREENSHOT_PATH, TARGET_SELECTOR, TARGET_URL},
};
use clap::Parser;
use log::{debug, error};
use tokio::task;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Banner screenshot capture", long_about = None)]
struct Args {
    /// Page to capture the banner from
    #[arg(short = 'u', long, default_value = TARGET_URL)]
    url: String,
    /// CSS selector of the banner image
    #[arg(short = 's', long, default_value = TARGET_SELECTOR)]
    selector: String,
    /// Where the element screenshot is written
    #[arg(long, default_value = SCREENSHOT_PATH)]
    screenshot: PathBuf,
    /// Where the JSON record is written
    #[arg(short = 'o', long, default_value = OUTPUT_PATH)]
    output: PathBuf,
    /// Show the browser window instead of running headless
    #[arg(long)]
    headful: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    debug!("Starting capture with {:#?}", args.clone());

    let options = RunnerOptions::default_builder()
        .url(args.url)
        .selector(args.selector)
        .screenshot_path(args.screenshot)
        .output_path(args.output)
        .headless(!args.headful)
        .build()?;

    // headless_chrome blocks, keep it off the runtime threads
    let res = task::spawn_blocking(move || Runner::<BrowserController>::new(options).run())
        .await
        .context("capture task panicked")?;

    match res {
        Ok(Some(record)) => debug!("captured {:#?}", record),
        Ok(None) => error!("capture incomplete, no data written"),
        Err(e) => error!("Error: {:?}", e),
    }

    Ok(())
}
