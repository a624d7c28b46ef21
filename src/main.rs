#[macro_use] extern crate log;

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use services_http::config::Config;
use services_http::executor::Executor;
use services_http::logger;
use services_http::request::{Request, Verb};
use services_http::{Error, Result};


const MODULE: &str = "MAIN";

/// Send one HTTP request through the services-http executor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the configurational file
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP verb
    #[arg(short = 'X', long, default_value = "GET")]
    verb: String,

    /// Request header as `Name: value`, may be repeated
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// In-memory request body
    #[arg(short, long, conflicts_with = "data_file")]
    data: Option<String>,

    /// File streamed as the request body
    #[arg(long)]
    data_file: Option<String>,

    /// Print the body line by line as it arrives
    #[arg(long)]
    lines: bool,

    /// Absolute target URL
    url: String,
}

fn build_request(args: &Args) -> Result<Request> {
    let verb: Verb = args.verb.parse()?;
    let mut request = Request::new(verb, args.url.as_str());

    for h in &args.headers {
        let (name, value) = h.split_once(':').ok_or_else(|| {
            Error::InvalidArgument(format!("header `{}` is not `Name: value`", h))
        })?;
        request = request.with_header(name.trim(), value.trim());
    }

    if let Some(data) = &args.data {
        request = request.with_content(data.as_bytes());
    }
    if let Some(path) = &args.data_file {
        request = request.with_content_stream(File::open(path)?);
    }
    Ok(request)
}

fn run(args: &Args) -> Result<bool> {
    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    logger::init_logger(&cfg)?;

    let reporter = logger::get_reporter(MODULE, "Request", "");

    let executor = Executor::new(&cfg.executor).map_err(&reporter)?;
    info!("[{}] Executor started with {} workers", MODULE, cfg.executor.worker_count());

    let request = build_request(args).map_err(&reporter)?;
    let mut response = executor.submit(request).wait().map_err(&reporter)?;

    eprintln!("HTTP {}", response.status());
    let mut names: Vec<&String> = response.headers().keys().collect();
    names.sort();
    for name in names {
        for value in response.header(name) {
            eprintln!("{}: {}", name, value);
        }
    }
    eprintln!();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.lines {
        while let Some(line) = response.read_line()? {
            writeln!(out, "{}", line)?;
        }
    } else {
        io::copy(response.input_stream(), &mut out)?;
    }
    out.flush()?;

    Ok(!response.is_error_status())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("services-http: {}", e);
            ExitCode::from(2)
        }
    }
}
