use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Installs the process-wide logger. `RUST_LOG` still takes precedence over
/// `level` for individual modules.
pub fn setup_logging(level: LevelFilter) {
    let mut builder = Builder::new();

    builder
        .target(Target::Stdout)
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        });

    // A second call (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}
