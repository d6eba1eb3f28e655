use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Errors, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log::LevelFilter;

/// Everything goes to stderr, stdout belongs to the interactive shell.
/// `app::error` is always logged, other targets follow `level`.
pub fn config(level: LevelFilter) -> Result<Config, Errors> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(concat!(
        "{T}=>kvs-client[",
        env!("CARGO_PKG_VERSION"),
        "]@{d(%Y-%m-%d %H:%M:%S)}=>{t}[{X(command)}]: {m}{n}"
        ))))
        .build();
    Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder()
            .appender("stderr")
            .additive(false)
            .build("app::error", LevelFilter::Error))
        .logger(Logger::builder()
            .appender("stderr")
            .additive(false)
            .build("app::request", level))
        .build(Root::builder()
            .appender("stderr")
            .build(level))
}
