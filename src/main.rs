//! col CLI - Command line interface for colgraph
//!
//! Writes, reads and mutates encrypted node graphs in a block store. Each
//! invocation is a separate session, so mutating commands take the graph
//! heads (`--head`) to load ancestry before changing anything.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use colgraph::config::{BackendConfig, Config};
use colgraph::model::{Address, Node};
use colgraph::{DagBuilder, DiffEntry, Graph, KeyPair, KeySet, PublicKey, SecretKey, SharedKey, Store};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "col")]
#[command(about = "An encrypted, content-addressed linked-data graph")]
#[command(version)]
struct Cli {
    /// Path to a config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Block store file; overrides the configured backend
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Read every block from the backend, bypassing the cache
    #[arg(long)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Args, Clone, Debug)]
struct KeyArgs {
    /// Own secret key (hex)
    #[arg(long)]
    secret: Option<String>,

    /// Counterparty public key (hex); defaults to one's own
    #[arg(long)]
    peer: Option<String>,

    /// The peer wrote the graph and we are reading it
    #[arg(long)]
    from_peer: bool,

    /// Shared symmetric key (hex)
    #[arg(long, conflicts_with_all = ["secret", "peer"])]
    shared: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair, or a shared key
    Keygen {
        #[arg(long)]
        shared: bool,
    },

    /// Write a node
    Write {
        name: String,
        /// JSON value
        value: String,
        /// Child addresses to link, each named after the child
        #[arg(long = "child")]
        children: Vec<String>,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Read and decrypt one node
    Read {
        address: String,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Visit every node below an address, leaves first
    Traverse {
        address: String,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Link children under a parent
    Insert {
        parent: String,
        children: Vec<String>,
        #[arg(long = "head")]
        heads: Vec<String>,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Replace a node's value and rehash its ancestors
    Update {
        address: String,
        /// JSON value
        value: String,
        /// Heads to load so their ancestry is rehashed too
        #[arg(long = "head")]
        heads: Vec<String>,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Unlink a node from its parents
    Delete {
        address: String,
        #[arg(long = "head")]
        heads: Vec<String>,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Show path changes between two heads
    Diff {
        old: String,
        new: String,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Build the diamond graph in memory, update its leaf and show the rehash
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Keygen { shared } => {
            if *shared {
                let key = SharedKey::generate()?;
                output(cli.format, &json!({ "shared": key.to_hex() }));
            } else {
                let pair = KeyPair::generate()?;
                output(
                    cli.format,
                    &json!({
                        "secret": pair.secret.to_hex(),
                        "public": pair.public.to_hex()
                    }),
                );
            }
        }

        Commands::Write {
            name,
            value,
            children,
            keys,
        } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            let value = parse_value(value)?;
            let node = if children.is_empty() {
                graph.write(name.as_str(), value, &keys).await?
            } else {
                let children = parse_addresses(children)?;
                graph.create(name.as_str(), value, &children, &keys).await?
            };
            graph.store().flush().await?;
            output(cli.format, &node_json(&node));
        }

        Commands::Read { address, keys } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            let node = graph.read(&parse_address(address)?, &keys).await?;
            output(cli.format, &node_json(&node));
        }

        Commands::Traverse { address, keys } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            let mut visited = Vec::new();
            let root = graph
                .traverse(&parse_address(address)?, &keys, |node| {
                    visited.push(node.clone());
                    Ok(())
                })
                .await?;

            match cli.format {
                OutputFormat::Json => output(
                    cli.format,
                    &json!({
                        "root": root.address.to_hex(),
                        "count": visited.len(),
                        "nodes": visited.iter().map(node_json).collect::<Vec<_>>()
                    }),
                ),
                OutputFormat::Text => print_tree(&root, &visited),
            }
        }

        Commands::Insert {
            parent,
            children,
            heads,
            keys,
        } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            load_heads(&mut graph, heads, &keys).await?;
            let children = parse_addresses(children)?;
            let mutation = graph
                .insert(&parse_address(parent)?, &children, &keys)
                .await?;
            graph.store().flush().await?;
            output(cli.format, &mutation_json(&mutation));
        }

        Commands::Update {
            address,
            value,
            heads,
            keys,
        } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            load_heads(&mut graph, heads, &keys).await?;
            let mutation = graph
                .update(&parse_address(address)?, parse_value(value)?, &keys)
                .await?;
            graph.store().flush().await?;
            output(cli.format, &mutation_json(&mutation));
        }

        Commands::Delete {
            address,
            heads,
            keys,
        } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            load_heads(&mut graph, heads, &keys).await?;
            let mutation = graph.delete(&parse_address(address)?, &keys).await?;
            graph.store().flush().await?;
            output(cli.format, &mutation_json(&mutation));
        }

        Commands::Diff { old, new, keys } => {
            let keys = key_set(keys)?;
            let mut graph = open_graph(&cli)?;
            let diff = graph
                .diff(&parse_address(old)?, &parse_address(new)?, &keys)
                .await?;
            let entries: Vec<_> = diff
                .entries
                .iter()
                .map(|e| match e {
                    DiffEntry::Added { path, address } => json!({
                        "type": "added",
                        "path": path,
                        "address": address.to_hex()
                    }),
                    DiffEntry::Removed { path, address } => json!({
                        "type": "removed",
                        "path": path,
                        "address": address.to_hex()
                    }),
                    DiffEntry::Modified { path, old, new } => json!({
                        "type": "modified",
                        "path": path,
                        "old": old.to_hex(),
                        "new": new.to_hex()
                    }),
                })
                .collect();
            output(
                cli.format,
                &json!({
                    "added": diff.added_count(),
                    "removed": diff.removed_count(),
                    "modified": diff.modified_count(),
                    "entries": entries
                }),
            );
        }

        Commands::Demo => demo(cli.format).await?,
    }

    Ok(())
}

fn open_graph(cli: &Cli) -> anyhow::Result<Graph> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = &cli.store {
        config.store.backend = BackendConfig::File { path: path.clone() };
    } else if config.store.backend == BackendConfig::Memory {
        // a memory store would not outlive the command
        config.store.backend = BackendConfig::File {
            path: PathBuf::from("graph.col"),
        };
    }
    if cli.no_cache {
        config.store.read_from_cache = false;
    }

    let store = config.store.open()?;
    Ok(Graph::with_config(store, config.graph))
}

fn key_set(args: &KeyArgs) -> anyhow::Result<KeySet> {
    if let Some(shared) = &args.shared {
        return Ok(KeySet::shared(SharedKey::from_hex(shared)?));
    }
    let Some(secret) = &args.secret else {
        bail!("either --secret or --shared is required");
    };
    let secret = SecretKey::from_hex(secret)?;
    let peer = match &args.peer {
        Some(peer) => PublicKey::from_hex(peer)?,
        None => secret.public(),
    };
    Ok(if args.from_peer {
        KeySet::opening(secret, peer)
    } else {
        KeySet::sealing(peer, secret)
    })
}

async fn load_heads(graph: &mut Graph, heads: &[String], keys: &KeySet) -> anyhow::Result<()> {
    for head in heads {
        graph.load(&parse_address(head)?, keys).await?;
    }
    Ok(())
}

fn parse_address(s: &str) -> anyhow::Result<Address> {
    s.parse::<Address>()
        .with_context(|| format!("Invalid address: {}", s))
}

fn parse_addresses(list: &[String]) -> anyhow::Result<Vec<Address>> {
    list.iter().map(|s| parse_address(s)).collect()
}

fn parse_value(s: &str) -> anyhow::Result<Value> {
    // bare words are taken as strings
    Ok(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())))
}

fn node_json(node: &Node) -> Value {
    let links: serde_json::Map<String, Value> = node
        .links()
        .iter()
        .map(|(name, address)| (name.clone(), Value::String(address.to_hex())))
        .collect();
    json!({
        "address": node.address.to_hex(),
        "name": node.name(),
        "value": node.value(),
        "links": links
    })
}

fn mutation_json(mutation: &colgraph::Mutation) -> Value {
    let remapped: serde_json::Map<String, Value> = mutation
        .remapped
        .iter()
        .map(|(old, new)| (old.to_hex(), Value::String(new.to_hex())))
        .collect();
    json!({
        "status": "ok",
        "node": mutation.node.as_ref().map(node_json),
        "heads": mutation.heads.iter().map(|h| h.address.to_hex()).collect::<Vec<_>>(),
        "removed": mutation.removed.map(|a| a.to_hex()),
        "remapped": remapped
    })
}

fn output(format: OutputFormat, value: &Value) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Text => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

/// Print the graph below `root` as an indented tree
fn print_tree(root: &Node, visited: &[Node]) {
    let by_address: std::collections::HashMap<_, _> =
        visited.iter().map(|n| (n.address, n)).collect();

    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        println!(
            "{}{} {} {}",
            "  ".repeat(depth),
            node.name(),
            node.address.short(),
            node.value()
        );
        for child in node.children().iter().rev() {
            if let Some(child) = by_address.get(child) {
                stack.push((*child, depth + 1));
            }
        }
    }
}

async fn demo(format: OutputFormat) -> anyhow::Result<()> {
    let keys = KeySet::own(&SecretKey::generate()?);
    let mut graph = Graph::new(Store::memory());

    let mut dag = DagBuilder::new();
    for name in ["g00", "g10", "g11", "g20", "g21", "g22", "g30"] {
        dag.node(name, json!({ "colName": name }));
    }
    for (parent, child) in [
        ("g00", "g10"),
        ("g00", "g11"),
        ("g10", "g20"),
        ("g10", "g21"),
        ("g11", "g21"),
        ("g11", "g22"),
        ("g20", "g30"),
        ("g21", "g30"),
        ("g22", "g30"),
    ] {
        dag.edge(parent, child);
    }
    let before = dag.submit(&mut graph, &keys).await?;

    let mutation = graph
        .update(&before["g30"], json!({ "colName": "g30", "version": 2 }), &keys)
        .await?;
    let head = mutation
        .head()
        .context("update produced more than one head")?
        .clone();

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = before
                .iter()
                .map(|(name, old)| {
                    json!({
                        "name": name,
                        "before": old.to_hex(),
                        "after": mutation.resolve(old).to_hex()
                    })
                })
                .collect();
            output(
                format,
                &json!({
                    "head": head.address.to_hex(),
                    "rewritten": mutation.rewritten(),
                    "nodes": rows
                }),
            );
        }
        OutputFormat::Text => {
            for (name, old) in &before {
                println!("{} {} -> {}", name, old.short(), mutation.resolve(old).short());
            }
            let visited = graph.collect(&head.address, &keys).await?;
            print_tree(&head, &visited);
        }
    }
    Ok(())
}
