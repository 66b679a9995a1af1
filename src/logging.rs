use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,  // default: warnings and errors
        1 => LevelFilter::Info,  // -v: info and up
        2 => LevelFilter::Debug, // -vv: debug and up
        _ => LevelFilter::Trace, // -vvv: trace and up
    }
}

pub fn init_logger(verbosity: u8) {
    let mut builder = Builder::new();
    builder.filter_level(level_for(verbosity));

    builder.format(|buf, record| {
        let level_label = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn  => "WARN ".yellow().bold(),
            Level::Info  => "INFO ".white().bold(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };

        writeln!(buf, "{} {}", level_label, record.args())
    });

    builder.init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(7), LevelFilter::Trace);
    }
}
