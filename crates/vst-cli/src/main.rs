//! vst-cli — command-line interface for the VST driver.

use anyhow::{Context, Result};

use vst_core::config::DriverConfig;
use vst_core::model::Request;
use vst_core::wire::Method;
use vst_net::Driver;

fn print_usage() {
    println!("Usage: vst-cli [--database <db>] <method> <path> [body]");
    println!();
    println!("  <method>     one of: get, post, put, delete, head, patch, options");
    println!("  <path>       request path, e.g. /_api/version");
    println!("  [body]       optional raw request body");
    println!();
    println!("Options:");
    println!("  --database <db>   target database (default: _system)");
    println!();
    println!("Configuration is loaded from $VST_CONFIG, else");
    println!("$XDG_CONFIG_HOME/vst-driver/config.toml, else ~/.config/vst-driver/config.toml,");
    println!("with VST_<SECTION>__<FIELD> environment overrides.");
    println!();
    println!("Examples:");
    println!("  vst-cli get /_api/version");
    println!("  vst-cli get /_api/collection --database mydb");
    println!("  vst-cli post /_api/collection '{{\"name\":\"mydb\"}}'");
}

fn parse_method(s: &str) -> Option<Method> {
    match s.to_ascii_lowercase().as_str() {
        "get" => Some(Method::Get),
        "post" => Some(Method::Post),
        "put" => Some(Method::Put),
        "delete" => Some(Method::Delete),
        "head" => Some(Method::Head),
        "patch" => Some(Method::Patch),
        "options" => Some(Method::Options),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut database: Option<String> = None;
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--database" {
            i += 1;
            database = Some(args.get(i).context("--database requires a value")?.clone());
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match remaining_refs.as_slice() {
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        [method, path] => run(method, path, None, database).await,
        [method, path, body] => run(method, path, Some(*body), database).await,
        other => {
            eprintln!("Unknown invocation: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn run(method: &str, path: &str, body: Option<&str>, database: Option<String>) -> Result<()> {
    let method = parse_method(method).with_context(|| format!("unknown method '{method}'"))?;

    let config = DriverConfig::load().context("failed to load driver configuration")?;
    let driver = Driver::connect(&config).await.context("failed to connect")?;

    let mut builder = Request::builder(method, path.to_owned());
    if let Some(db) = database {
        builder = builder.database(db);
    }
    if let Some(body) = body {
        builder = builder.body(body.as_bytes().to_vec());
    }
    let request = builder.build().context("invalid request")?;

    let response = driver.execute(request).await;
    driver.shutdown().await;

    let response = response.context("request failed")?;
    println!("status: {}", response.code);
    for (k, v) in &response.meta {
        println!("{k}: {v}");
    }
    println!();
    println!("{}", String::from_utf8_lossy(&response.body));

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
