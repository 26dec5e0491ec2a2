use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cellpilot::backend::HttpBackend;
use cellpilot::config::ClientConfig;
use cellpilot::logging::{log, obj, v_bool, v_str, Domain, Level};
use cellpilot::preview::PreviewContent;
use cellpilot::record::{OutputRecord, SummaryDatum};
use cellpilot::selection::Selection;
use cellpilot::view::ResultView;

const USAGE: &str = "usage: cellpilot show <record.json> [artifact-path] | cellpilot ping";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = ClientConfig::from_env();
    let backend = HttpBackend::new(&cfg)?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("ping") => {
            let ok = backend.ping().await.unwrap_or(false);
            log(
                Level::Info,
                Domain::System,
                "ping",
                obj(&[("backend", v_str(&cfg.backend_base)), ("ok", v_bool(ok))]),
            );
            println!("{}: {}", cfg.backend_base, if ok { "ok" } else { "unreachable" });
            if !ok {
                std::process::exit(1);
            }
        }
        Some("show") => {
            let Some(record_path) = args.get(1) else {
                bail!(USAGE);
            };
            let record = OutputRecord::from_path(&PathBuf::from(record_path))
                .with_context(|| format!("loading {}", record_path))?;
            show(&cfg, &backend, record, args.get(2).cloned()).await?;
        }
        _ => bail!(USAGE),
    }
    Ok(())
}

async fn show(
    cfg: &ClientConfig,
    backend: &HttpBackend,
    record: OutputRecord,
    target: Option<String>,
) -> Result<()> {
    let mut view = ResultView::new(cfg.max_preview_rows);
    let mut ticket = view.load(record, backend);
    if let Some(path) = target {
        if !view.catalog().contains(&path) {
            bail!("{} is not an artifact of this record", path);
        }
        ticket = view.select(Selection::Artifact(path), backend).or(ticket);
    }
    if let Some(ticket) = ticket {
        let outcome = ticket.run(backend).await;
        view.apply(outcome);
    }

    println!("{}", view.title());
    for item in view.rail() {
        let marker = if item.selected { '>' } else { ' ' };
        let category = item.category.as_deref().unwrap_or(item.group.title());
        println!("{} [{}] {}", marker, category, item.label);
    }
    println!();
    print_content(view.preview().content());
    if let Some(record) = view.record() {
        if view.overlay().params_available(view.preview().strategy(), record) {
            println!("\nParameters");
            for (key, value) in record.params().into_iter().flatten() {
                println!("  {}: {}", key, value);
            }
        }
    }
    Ok(())
}

fn print_content(content: &PreviewContent) {
    if let Some(placeholder) = content.placeholder() {
        println!("{}", placeholder);
    }
    match content {
        PreviewContent::Summary(summary) => print_summary(summary),
        PreviewContent::Image { path, locator } => println!("{}\n{}", path, locator),
        PreviewContent::Table { table, .. } => {
            println!("{}", table.headers.join("\t"));
            for row in &table.rows {
                println!("{}", row.join("\t"));
            }
        }
        PreviewContent::Text { text, .. } => println!("{}", text),
        PreviewContent::Unsupported { path } => println!("{}", path),
        PreviewContent::Empty | PreviewContent::Loading(_) => {}
    }
}

fn print_summary(summary: &SummaryDatum) {
    println!(
        "{}  {} / {} / {}",
        summary.file_name(),
        summary.cell_label(),
        summary.gene_label(),
        summary.state_label()
    );
    for category in summary.sorted_label_counts() {
        println!("{}", category.name);
        for (label, count) in category.labels {
            println!("  {:<32} {}", label, count);
        }
    }
    let clusters = SummaryDatum::table(&summary.clusters);
    if !clusters.headers.is_empty() {
        println!("\n{}", clusters.headers.join("\t"));
        for row in clusters.rows {
            println!("{}", row.join("\t"));
        }
    }
}
