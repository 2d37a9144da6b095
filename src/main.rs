use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use topic_sections::db::{self, TopicKey};
use topic_sections::illustrations::{self, IllustrationKey};
use topic_sections::import;
use topic_sections::parser::{self, Partition};

#[derive(Parser)]
#[command(name = "topic_sections", about = "Split topic articles into anchored, illustrated sections")]
struct Cli {
    /// Path to the content catalog
    #[arg(long, global = true, default_value = db::DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema
    Init,
    /// Load a JSON content export into the catalog
    Import {
        /// JSON array of {layer, chapter, topic, title, body, illustration_key}
        file: PathBuf,
    },
    /// Partition catalog topics that have no sections yet
    Process {
        /// Max topics to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Partition one catalog topic and preview its sections
    Show {
        layer: String,
        chapter: String,
        topic: String,
        /// Print the partition as JSON
        #[arg(long)]
        json: bool,
    },
    /// Partition a Markdown file without touching the catalog
    Split {
        file: PathBuf,
        /// Illustration key to resolve
        #[arg(short, long)]
        key: Option<String>,
        /// Print the partition as JSON
        #[arg(long)]
        json: bool,
    },
    /// Topics overview table
    Overview {
        /// Filter by layer
        #[arg(short, long)]
        layer: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show catalog statistics
    Stats,
    /// List illustration keys and their bundles
    Illustrations,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            println!("Catalog ready at {}", cli.db.display());
            Ok(())
        }
        Commands::Import { file } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let records = import::load_records(&file)?;
            let changed = db::upsert_topics(&conn, &records)?;
            println!(
                "Imported {} new or changed topics ({} in export).",
                changed,
                records.len()
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let topics = db::fetch_unprocessed(&conn, limit)?;
            if topics.is_empty() {
                println!("No unprocessed topics. Run 'import' first.");
                return Ok(());
            }
            println!("Processing {} topics...", topics.len());
            let counts = process_topics(&conn, &topics)?;
            counts.print();
            Ok(())
        }
        Commands::Show {
            layer,
            chapter,
            topic,
            json,
        } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let key = TopicKey::new(&layer, &chapter, &topic);
            match db::fetch_topic(&conn, &key)? {
                None => println!("No topic at {}.", key),
                Some(article) => {
                    let partition = parser::partition_article(&article);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&partition)?);
                    } else {
                        println!("{} ({})\n", article.title, key);
                        print_partition(&partition);
                    }
                }
            }
            Ok(())
        }
        Commands::Split { file, key, json } => {
            let body = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let partition = parser::partition(&body, key.as_deref());
            if json {
                println!("{}", serde_json::to_string_pretty(&partition)?);
            } else {
                print_partition(&partition);
            }
            Ok(())
        }
        Commands::Overview { layer, limit } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, layer.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No topics found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<12} | {:<16} | {:<24} | {:<28} | {:<18} | {:>4}",
                "#", "Layer", "Chapter", "Topic", "Title", "Illustration", "Secs"
            );
            println!("{}", "-".repeat(122));

            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<12} | {:<16} | {:<24} | {:<28} | {:<18} | {:>4}",
                    i + 1,
                    truncate(&r.key.layer, 12),
                    truncate(&r.key.chapter, 16),
                    truncate(&r.key.topic, 24),
                    truncate(&r.title, 28),
                    truncate(&r.illustration_key, 18),
                    r.section_count
                );
            }

            println!("\n{} topics | key: <layer>/<chapter>/<topic>", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Layers:    {}", s.layers);
            println!("Chapters:  {}", s.chapters);
            println!("Topics:    {}", s.topics);
            println!("Processed: {}", s.processed);
            println!("Sections:  {}", s.sections);
            Ok(())
        }
        Commands::Illustrations => {
            for key in IllustrationKey::ALL {
                print_bundle(key.as_str(), &key.bundle());
            }
            print_bundle("(default)", &illustrations::default_bundle());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    topics: usize,
    sections: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!("Saved {} topics, {} sections.", self.topics, self.sections);
    }
}

fn process_topics(
    conn: &rusqlite::Connection,
    topics: &[db::StoredTopic],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(topics.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        topics: 0,
        sections: 0,
    };

    for chunk in topics.chunks(500) {
        let processed: Vec<db::ProcessedTopic> = chunk
            .par_iter()
            .map(|t| db::ProcessedTopic {
                topic_id: t.topic_id,
                sections: parser::partition_article(&t.source).sections,
            })
            .collect();

        counts.topics += processed.len();
        counts.sections += db::save_sections(conn, &processed)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    info!(
        "Processed {} topics into {} sections",
        counts.topics, counts.sections
    );
    Ok(counts)
}

fn print_partition(partition: &Partition) {
    println!(
        "{:>3} | {:<28} | {:<28} | {:>6} | {:<24}",
        "#", "Anchor", "Title", "Chars", "Illustration"
    );
    println!("{}", "-".repeat(100));

    for (i, s) in partition.sections.iter().enumerate() {
        let paired = partition
            .illustrations
            .for_section(i)
            .map(|ill| ill.component)
            .unwrap_or("-");
        println!(
            "{:>3} | {:<28} | {:<28} | {:>6} | {:<24}",
            i + 1,
            truncate(&format!("#{}", s.id), 28),
            truncate(&s.title, 28),
            s.body.chars().count(),
            paired
        );
    }

    println!("\n{} sections", partition.sections.len());
}

fn print_bundle(name: &str, bundle: &illustrations::IllustrationBundle) {
    let main = bundle.main.map(|m| m.component).unwrap_or("-");
    let inline: Vec<_> = bundle.inline.iter().map(|i| i.component).collect();
    println!("{:<18} main: {:<18} inline: {}", name, main, inline.join(", "));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
