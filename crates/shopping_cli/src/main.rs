//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a store from an optional JSON config path (first argument).
//! - Add one sample item through the live total and print the list.

use log::{error, info};
use shopping_core::{await_first_value, core_version, ShoppingItem, ShoppingStore, StoreConfig};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("shopping_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    config.init_logging()?;

    let store = ShoppingStore::open(&config)?;
    let writer = store.clone();
    let sample = ShoppingItem::new("banana", 2, 2.0, "imageurl");
    let total = await_first_value(
        &store.observe_total_price(),
        config.await_timeout(),
        move || {
            if let Err(err) = writer.insert_or_replace(&sample) {
                error!("event=cli_seed module=cli status=error error={err}");
            }
        },
    )?;

    let items = store.all_items()?;
    info!(
        "event=cli_run module=cli status=ok items={} version={}",
        items.len(),
        core_version()
    );

    println!("{}", serde_json::to_string_pretty(&items)?);
    match total {
        Some(total) => println!("total={total:.2}"),
        None => println!("total=none"),
    }
    Ok(())
}
