use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn setup_logging(log_level: &str) {
    let level: Directive = log_level.parse().unwrap_or_else(|_| {
        eprintln!("Invalid log level {:?}, falling back to info", log_level);
        "info".parse().expect("static directive")
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true) // Show thread IDs
                .with_thread_names(true) // Show thread names
                .with_target(true) // Show module path
                .with_file(true) // Show file name
                .with_line_number(true) // Show line numbers
                .pretty(),
        )
        .with(
            EnvFilter::from_default_env()
                .add_directive(level)
                .add_directive("tokio=info".parse().unwrap())
                .add_directive("runtime=info".parse().unwrap())
                .add_directive("hyper=info".parse().unwrap())
                .add_directive("tower_http=debug".parse().unwrap()),
        )
        .try_init()
        .expect("Failed to initialize logging");
}
