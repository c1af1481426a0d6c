use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use mindtab::cli::args::Cli;
use mindtab::cli::commands::execute_command;
use mindtab::cli::output;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -v -v -v");
            LevelFilter::TRACE
        }
    };

    // Create a noisy module filter
    let noisy_modules = ["config"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    // Create a subscriber with formatted output directed to stderr
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    let filtered_layer = fmt_layer.with_filter(filter).with_filter(module_filter);

    tracing_subscriber::registry().with(filtered_layer).init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mindtab::util::testing;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        testing::init_test_setup();
        Cli::command().debug_assert();
    }

    #[test]
    fn given_repeated_verbose_flag_when_parsing_then_counts_occurrences() {
        let cli = Cli::try_parse_from(["mindtab", "-vv", "tags"]).expect("valid args");
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn given_export_without_source_when_parsing_then_fails() {
        assert!(Cli::try_parse_from(["mindtab", "export", "-t", "p1"]).is_err());
    }

    #[test]
    fn given_comma_separated_tags_when_parsing_then_splits_them() {
        let cli = Cli::try_parse_from(["mindtab", "filter", "doc.json", "-t", "p1,p2", "-t", "important"])
            .expect("valid args");
        match cli.command {
            Some(mindtab::cli::Commands::Filter { tags, .. }) => {
                assert_eq!(tags, vec!["p1", "p2", "important"])
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn given_cases_command_when_parsing_then_requires_tags_and_accepts_output() {
        assert!(Cli::try_parse_from(["mindtab", "cases", "doc.json"]).is_err());

        let cli = Cli::try_parse_from(["mindtab", "cases", "doc.json", "-t", "p1", "-o", "out.json"])
            .expect("valid args");
        match cli.command {
            Some(mindtab::cli::Commands::Cases { tags, output, .. }) => {
                assert_eq!(tags, vec!["p1"]);
                assert_eq!(output, Some(std::path::PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
