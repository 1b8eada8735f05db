use anyhow::{anyhow, Result};
use serde_json::json;

use aggexplorer::choices::tooltip_rows;
use aggexplorer::config::ExplorerConfig;
use aggexplorer::fetch::{fetch_all, AggregationSource, FileSource, HttpSource};
use aggexplorer::logging::{log, obj, v_str, Domain, Level};
use aggexplorer::merge::MergedAggregations;
use aggexplorer::pipeline::build_view;
use aggexplorer::url_state::ExplorerUrlState;

const USAGE: &str = "usage: aggexplorer <explorer-url-or-query> [--cursor <epoch-secs>] [--now <epoch-secs>] [--fixtures <dir>]";

struct Args {
    link: String,
    cursor: Option<f64>,
    now: Option<f64>,
    fixtures: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut link = None;
    let mut cursor = None;
    let mut now = None;
    let mut fixtures = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cursor" => cursor = Some(parse_secs(args.next(), "--cursor")?),
            "--now" => now = Some(parse_secs(args.next(), "--now")?),
            "--fixtures" => fixtures = Some(args.next().ok_or_else(|| anyhow!("--fixtures needs a directory"))?),
            "-h" | "--help" => return Err(anyhow!(USAGE)),
            other if link.is_none() => link = Some(other.to_string()),
            other => return Err(anyhow!("unexpected argument {}\n{}", other, USAGE)),
        }
    }
    Ok(Args {
        link: link.ok_or_else(|| anyhow!(USAGE))?,
        cursor,
        now,
        fixtures,
    })
}

fn parse_secs(raw: Option<String>, flag: &str) -> Result<f64> {
    raw.as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| anyhow!("{} needs epoch seconds", flag))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let cfg = ExplorerConfig::from_env();
    let url = ExplorerUrlState::from_link(&args.link)?;
    log(
        Level::Info,
        Domain::System,
        "start",
        obj(&[
            ("link", v_str(&url.to_query())),
            ("configs", json!(url.configs.len())),
            ("api_base", v_str(&cfg.api_base)),
        ]),
    );

    let source: Box<dyn AggregationSource + Send + Sync> = match &args.fixtures {
        Some(dir) => Box::new(FileSource::new(dir)),
        None => Box::new(HttpSource::new(&cfg)?),
    };
    let results = fetch_all(source.as_ref(), &url, &cfg.retry()).await?;
    let merged = MergedAggregations::merge_all(&results);

    let now = args.now.unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as f64 / 1000.0);
    let view = build_view(&merged, &url, now);

    let mut out = json!({ "view": view });
    if let (Some(cursor), Some(question)) = (args.cursor, view.question.as_ref()) {
        out["tooltip"] = json!({
            "cursor": cursor,
            "rows": tooltip_rows(&view.choices, cursor, question),
        });
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
