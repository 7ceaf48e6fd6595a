//! Command-line driver for the netlog pipeline.
//!
//! Submits each URL through a transport with the logger's hook installed,
//! then prints what was logged along with its curl export.
//!
//! Usage:
//! ```
//! cargo run --bin netlog_demo -- https://example.com/a ftp://files.example.com
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use netlog_core::dispatch::Dispatcher;
use netlog_core::display::ConsoleDisplay;
use netlog_core::export::{curl_description, CurlContext};
use netlog_core::intercept::Transport;
use netlog_core::models::rule::RequestRule;
use netlog_core::models::Request;
use netlog_core::redirect::{RedirectTable, Redirector};
use netlog_core::{LoggerConfig, NetworkLogger};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

struct DemoArgs {
    config_path: Option<PathBuf>,
    verbose: Option<bool>,
    excluded_hosts: Vec<String>,
    redirects: Vec<(String, String)>,
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = parse_args();

    let mut config = match &args.config_path {
        Some(path) => LoggerConfig::load_from_path(path)?,
        None => LoggerConfig::from_env()?,
    };
    if let Some(verbose) = args.verbose {
        config.verbose = verbose;
    }
    config.excluded_hosts.extend(args.excluded_hosts.iter().cloned());

    let logger = NetworkLogger::new(&config);
    logger.attach_display(Some(Arc::new(ConsoleDisplay::new(Arc::clone(
        logger.console(),
    )))));
    let mut redirects = RedirectTable::new();
    for (from, to) in &args.redirects {
        redirects.push(Redirector::to_host(
            format!("{} -> {}", from, to),
            RequestRule::host(from.clone()),
            "http",
            to.clone(),
            None,
        ));
    }
    logger.set_redirects(redirects);

    let mut live = logger.subscribe_logged();
    let printer = tokio::spawn(async move {
        while let Ok(logged) = live.recv().await {
            tracing::info!("live: {}", logged.summary());
        }
    });

    logger.start();
    let transport = Transport::new("netlog-demo");
    for url in &args.urls {
        let request = Request::get(url.clone()).with_header("User-Agent", "netlog_demo");
        let submission = transport.submit(request);
        if submission.redirected {
            tracing::info!("{} redirected to {}", url, submission.request.url);
        }
    }

    // Wait until the dispatcher has delivered everything to the logger.
    tokio::task::spawn_blocking(|| Dispatcher::global().flush()).await?;
    logger.stop();

    let context = CurlContext::default().with_session_header("User-Agent", "netlog_demo");
    for logged in logger.requests().iter().rev() {
        println!("{}", logged.summary());
        println!("{}\n", curl_description(logged.request(), &context));
    }
    println!(
        "{} of {} request(s) logged",
        logger.request_count(),
        args.urls.len()
    );

    drop(logger);
    printer.await?;
    Ok(())
}

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn parse_args() -> DemoArgs {
    let mut args = std::env::args().skip(1);
    let mut parsed = DemoArgs {
        config_path: None,
        verbose: None,
        excluded_hosts: Vec::new(),
        redirects: Vec::new(),
        urls: Vec::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(path) = args.next() {
                    parsed.config_path = Some(PathBuf::from(path));
                }
            }
            "--quiet" => parsed.verbose = Some(false),
            "--exclude" => {
                if let Some(host) = args.next() {
                    parsed.excluded_hosts.push(host);
                }
            }
            "--redirect" => match args.next().as_deref().and_then(|r| r.split_once('=')) {
                Some((from, to)) => parsed.redirects.push((from.to_string(), to.to_string())),
                None => eprintln!("--redirect expects FROM_HOST=TO_HOST"),
            },
            "--help" | "-h" => {
                eprintln!("netlog demo");
                eprintln!();
                eprintln!("Usage: netlog_demo [OPTIONS] <URL>...");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --config <PATH>              JSON logger config");
                eprintln!("  --quiet                      Turn console diagnostics off");
                eprintln!("  --exclude <HOST>             Never log hosts containing HOST");
                eprintln!("  --redirect <FROM>=<TO>       Send requests for FROM to http://TO");
                eprintln!("  --help, -h                   Show this help");
                std::process::exit(0);
            }
            url => parsed.urls.push(url.to_string()),
        }
    }

    parsed
}
