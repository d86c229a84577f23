use std::env;
use std::process::ExitCode;

use anyhow::{bail, Context};
use colored::*;

use hookwire::hooks::{HookEvent, HookOptions, HookOutcome, HookTarget, PathRequest, Registry};
use hookwire::logging;
use hookwire::{EngineConfig, Hookable, ObjectId, Value};

const USAGE: &str = "usage: hookwire [--config FILE] [--page N] <request-path> <pattern>...";

/// Object path hooks are dispatched on
struct Router {
    id: ObjectId,
    class: String,
}

impl Hookable for Router {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

struct Args {
    config: Option<String>,
    page_num: Option<u32>,
    path: String,
    patterns: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = None;
    let mut page_num = None;
    let mut positional = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().context("--config needs a file")?),
            "--page" => {
                let page = args.next().context("--page needs a number")?;
                page_num = Some(page.parse().with_context(|| format!("invalid page number '{}'", page))?);
            }
            "-h" | "--help" => bail!(USAGE),
            _ => positional.push(arg),
        }
    }

    if positional.len() < 2 {
        bail!(USAGE);
    }
    let path = positional.remove(0);
    Ok(Args {
        config,
        page_num,
        path,
        patterns: positional,
    })
}

fn main() -> anyhow::Result<ExitCode> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(file) => EngineConfig::from_file(file).with_context(|| format!("loading {}", file))?,
        None => EngineConfig::default(),
    };
    let _guard = logging::init_logging(&config.logging)?;

    let registry = Registry::with_config(config.clone());
    for pattern in &args.patterns {
        let claimed = Value::from(pattern.as_str());
        registry
            .add_hook(
                pattern,
                HookTarget::function(move |_event: &mut HookEvent| HookOutcome::value(claimed.clone())),
                HookOptions::new(),
            )
            .with_context(|| format!("registering {}", pattern))?;
    }
    registry.close_routes();
    tracing::debug!("[hookwire] Registered {} path hooks", args.patterns.len());

    let mut request = PathRequest::new(args.path.as_str());
    request.page_num = args.page_num;

    let mut router = Router {
        id: ObjectId::new(),
        class: config.path_hook_class.clone(),
    };
    let routed = registry.dispatch_path(&mut router, &request);

    if routed.handled {
        println!(
            "{} {} {}",
            "Matched".green().bold(),
            request.path,
            routed.pattern.as_deref().unwrap_or("").cyan()
        );
        for (name, value) in &routed.captures {
            println!("  {} = {}", name.yellow(), value);
        }
        return Ok(ExitCode::SUCCESS);
    }

    match routed.redirect {
        Some(target) => {
            println!("{} {} -> {}", "Redirect".yellow().bold(), request.path, target);
            Ok(ExitCode::from(2))
        }
        None => {
            println!("{} {}", "No match".red().bold(), request.path);
            Ok(ExitCode::from(1))
        }
    }
}
