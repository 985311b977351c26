// src/logging.rs

use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

/// Initialize logging once. `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LevelFilter) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }

        let result = builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {} {} - {}",
                    buf.timestamp_millis(),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .try_init();

        if let Err(e) = result {
            eprintln!("logger already initialized: {}", e);
        }
    });
}
