use clap::Parser;
use expr_context::{Context, MapContext, Name, ReservedPolicy, Resolver, ResolverOptions};
use serde_json::Value;
use std::sync::Arc;
use tracing::Level;

/// Simple runner: resolve a dotted name against a JSON object of variables.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Variables as a JSON object; keys may themselves be dotted ("a.b").
    vars: String,
    /// Dotted name to resolve, e.g. x.y.z
    name: String,
    /// Resolver options as JSON, e.g. '{"antish": false}'
    #[arg(long)]
    options: Option<String>,
    /// Only look up the root segment; never dotted prefixes
    #[arg(long)]
    root_only: bool,
    /// Unresolved names print null instead of failing
    #[arg(long)]
    lenient: bool,
    /// Allow the engine-reserved names
    #[arg(long)]
    permit_reserved: bool,
    /// Follow member segments and print the final value instead of the binding
    #[arg(long)]
    value: bool,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Parse input JSON.
    let vars: Value = match serde_json::from_str(&args.vars) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => fail("Variables must be a JSON object"),
        Err(e) => fail(format!("Invalid JSON: {e}")),
    };

    // Build options; flags override the JSON options.
    let mut opts = match args.options.as_deref() {
        Some(s) => ResolverOptions::from_json(s).unwrap_or_else(|e| fail(e)),
        None => ResolverOptions::default(),
    };
    if args.root_only { opts.antish = false; }
    if args.lenient { opts.strict = false; }
    if args.permit_reserved { opts.reserved = ReservedPolicy::Permit; }

    let name = Name::parse(&args.name).unwrap_or_else(|e| fail(e));
    let ctx: Arc<dyn Context> = Arc::new(MapContext::from_json(vars));
    let resolver = Resolver::new(opts);

    let out = resolver.evaluate(ctx, |run| {
        if args.value {
            run.resolve_value(&name)
        } else {
            match run.resolve(&name) {
                Ok(binding) => Ok(serde_json::to_value(binding)?),
                Err(e) if !resolver.options().strict && e.is_recoverable() => Ok(Value::Null),
                Err(e) => Err(e),
            }
        }
    });

    match out.and_then(|v| Ok(serde_json::to_string_pretty(&v)?)) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(e),
    }
}
