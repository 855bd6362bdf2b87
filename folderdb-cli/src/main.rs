use clap::{Parser, Subcommand, ValueEnum};
use folderdb::{Filter, LoginRequest, Operator, RegisterRequest, StorageConfig, Store};
use std::error::Error;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;

/// FolderDB CLI - work with a folder-of-JSON-files data store from the command line
#[derive(Parser)]
#[command(name = "folderdb", version, about)]
struct Cli {
    /// Path to the data directory (overrides config and FOLDERDB_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// YAML config file (default: $FOLDERDB_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Get a single document by ID
    Get {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
    },

    /// List every readable document in a collection
    List {
        /// Collection name
        collection: String,
    },

    /// Write a document under a caller-chosen ID
    Create {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
        #[command(flatten)]
        body: BodyArgs,
    },

    /// Insert a new document under a generated ID
    Insert {
        /// Collection name
        collection: String,
        #[command(flatten)]
        body: BodyArgs,
    },

    /// Replace an existing document
    Update {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
        #[command(flatten)]
        body: BodyArgs,
    },

    /// Delete a document
    Delete {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Documents whose field equals a value (case-insensitive)
    Search {
        /// Collection name
        collection: String,
        /// Field name
        field: String,
        /// Value to match
        value: String,
    },

    /// Documents matching every filter
    Query {
        /// Collection name
        collection: String,
        /// Filters as field:operator:value (e.g. --filter age:gt:18)
        #[arg(long = "filter", value_parser = parse_filter, required = true)]
        filters: Vec<Filter>,
    },

    /// Store an image file
    ImagePut {
        /// Image file to upload
        file: PathBuf,
        /// Asset ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Fetch an image by ID
    ImageGet {
        /// Asset ID
        id: String,
        /// Write the image here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Register a user
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        passwd: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// Check a user's credentials
    Login {
        #[arg(long)]
        name: String,
        #[arg(long)]
        passwd: String,
    },
}

/// Where a document body comes from.
#[derive(clap::Args)]
struct BodyArgs {
    /// Field values (e.g. --field name="Alice Chen")
    #[arg(long = "field", value_parser = parse_key_value)]
    fields: Vec<(String, String)>,
    /// Read the JSON body from a file
    #[arg(long)]
    content_file: Option<PathBuf>,
    /// Read the JSON body from stdin
    #[arg(long)]
    content_stdin: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn parse_filter(s: &str) -> Result<Filter, String> {
    let mut parts = s.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(field), Some(op), Some(value)) if !field.is_empty() => {
            let operator: Operator = op.parse()?;
            Ok(Filter::new(field, operator, value))
        }
        _ => Err(format!("Invalid filter '{s}': expected field:operator:value")),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        // Machine-readable error on stderr
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn open_store(cli: &Cli) -> Result<Store, Box<dyn Error>> {
    let mut config = StorageConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.base_directory = dir.clone();
    }
    log::debug!("Opening store at {}", config.base_directory.display());
    Ok(Store::open(config)?)
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let store = open_store(&cli)?;

    match cli.command {
        Command::Get { collection, id } => {
            let bytes = store.collection(&collection)?.get(&id)?;
            let doc: serde_json::Value = serde_json::from_slice(&bytes)?;
            print_output(&doc, &cli.format)?;
        }

        Command::List { collection } => {
            let docs = store.collection(&collection)?.list()?;
            print_output(&serde_json::Value::Array(docs), &cli.format)?;
        }

        Command::Create {
            collection,
            id,
            body,
        } => {
            let content = read_body(body)?;
            let id = store.collection(&collection)?.create(&id, &content)?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), &cli.format)?;
        }

        Command::Insert { collection, body } => {
            let content = read_body(body)?;
            let id = store.collection(&collection)?.insert(&content)?;
            print_output(&serde_json::json!({ "id": id }), &cli.format)?;
        }

        Command::Update {
            collection,
            id,
            body,
        } => {
            let content = read_body(body)?;
            store.collection(&collection)?.update(&id, &content)?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), &cli.format)?;
        }

        Command::Delete {
            collection,
            id,
            dry_run,
        } => {
            let docs = store.collection(&collection)?;
            if dry_run {
                let bytes = docs.get(&id)?;
                let doc: serde_json::Value = serde_json::from_slice(&bytes)?;
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "collection": collection, "id": id },
                        "document": doc,
                    }),
                    &cli.format,
                )?;
            } else {
                docs.delete(&id)?;
                print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
            }
        }

        Command::Search {
            collection,
            field,
            value,
        } => {
            let docs = store.collection(&collection)?.search(&field, &value)?;
            print_output(&serde_json::Value::Array(docs), &cli.format)?;
        }

        Command::Query {
            collection,
            filters,
        } => {
            let report = store.collection(&collection)?.complex_search_report(&filters)?;
            if report.skipped > 0 {
                log::warn!("Skipped {} unreadable documents", report.skipped);
            }
            print_output(&serde_json::Value::Array(report.documents), &cli.format)?;
        }

        Command::ImagePut { file, id } => {
            let bytes = std::fs::read(&file)
                .map_err(|e| format!("Failed to read image '{}': {e}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = store.assets().store(id.as_deref(), &bytes, &file_name)?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), &cli.format)?;
        }

        Command::ImageGet { id, output } => {
            let asset = store.assets().retrieve(&id)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &asset.bytes)?;
                    print_output(
                        &serde_json::json!({
                            "id": id,
                            "mime_type": asset.mime_type,
                            "bytes": asset.bytes.len(),
                        }),
                        &cli.format,
                    )?;
                }
                None => std::io::stdout().write_all(&asset.bytes)?,
            }
        }

        Command::Register {
            name,
            passwd,
            email,
        } => {
            let response = store.credentials().register(&RegisterRequest {
                name,
                passwd,
                email,
            })?;
            print_output(&serde_json::to_value(response)?, &cli.format)?;
        }

        Command::Login { name, passwd } => {
            let response = store.credentials().login(&LoginRequest { name, passwd })?;
            print_output(&serde_json::to_value(response)?, &cli.format)?;
        }
    }

    Ok(())
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&to_yaml(value))?),
    }
    Ok(())
}

/// JSON numbers keep their source text, which serde_yaml cannot serialize
/// directly; map them onto YAML numbers, or strings when out of range.
fn to_yaml(value: &serde_json::Value) -> serde_yaml::Value {
    use serde_json::Value;
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Number(n) => {
            let text = n.to_string();
            if let Some(i) = n.as_i64() {
                serde_yaml::Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                serde_yaml::Value::Number(u.into())
            } else if text.contains(['.', 'e', 'E']) {
                match n.as_f64().filter(|f| f.is_finite()) {
                    Some(f) => serde_yaml::Value::Number(f.into()),
                    None => serde_yaml::Value::String(text),
                }
            } else {
                serde_yaml::Value::String(text)
            }
        }
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Array(items) => serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect()),
        Value::Object(map) => serde_yaml::Value::Mapping(
            map.iter()
                .map(|(k, v)| (serde_yaml::Value::String(k.clone()), to_yaml(v)))
                .collect(),
        ),
    }
}

fn fields_to_value(fields: &[(String, String)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, val) in fields {
        // Numbers, booleans, arrays and objects parse as JSON; anything else is a string
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    serde_json::Value::Object(map)
}

/// The document body: a content file, stdin, or `--field` pairs, in that order.
fn read_body(body: BodyArgs) -> Result<String, Box<dyn Error>> {
    if let Some(path) = body.content_file {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read content file '{}': {e}", path.display()))?;
        Ok(content)
    } else if body.content_stdin {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        Ok(serde_json::to_string(&fields_to_value(&body.fields))?)
    }
}
