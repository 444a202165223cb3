//! Print the stored record for one listing URL/id.
//!
//! Usage: `lookup <url-or-id>` (state file from `STATE_PATH`, default `./state.json`).

use vinyl_watch::state::{StateStore, DEFAULT_STATE_PATH};

fn main() {
    let _ = dotenvy::dotenv();
    vinyl_watch::init_tracing("warn");

    let Some(id) = std::env::args().nth(1) else {
        eprintln!("usage: lookup <url-or-id>");
        std::process::exit(2);
    };
    let path = std::env::var("STATE_PATH").unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string());
    let store = StateStore::new(path);

    match store.get_record(&id) {
        Some(rec) => match serde_json::to_string_pretty(&rec) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("cannot render record: {e}");
                std::process::exit(1);
            }
        },
        None => println!("not found"),
    }
}
