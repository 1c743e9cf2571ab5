//! CacheDB command-line interface.
//!
//! Every subcommand opens the configured backend, runs one operation and
//! prints the result as JSON on stdout. Logs go to stderr.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use cachedb::api::{Cache, CacheConfig, ServiceResult, StorageMode};
use cachedb::archive::{ArchiveOperation, BatchAction, BatchCondition, BatchOperation};
use cachedb::cache::{
    CacheContent, CacheError, CacheHash, CacheId, ContentEncoding, ContentKind, Namespace, SemanticKey,
    StoreOptions,
};
use cachedb::strategy::StorageStrategy;

/// Namespaced, content-addressable cache with immutable archive versioning.
#[derive(Parser, Debug)]
#[command(name = "cachedb", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend: memory, local_disk or git.
    #[arg(long, global = true, env = "CACHE__SERVICE__STORAGE_MODE")]
    storage_mode: Option<String>,

    /// Root directory of the local-disk backend.
    #[arg(long, global = true, env = "CACHE__SERVICE__LOCAL_DISK_PATH")]
    local_disk_path: Option<PathBuf>,

    /// Repository directory of the git backend.
    #[arg(long, global = true, env = "CACHE__SERVICE__GIT_PATH")]
    git_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct StoreArgs {
    #[arg(short, long)]
    namespace: Option<String>,

    /// direct, temporal, temporal_latest, temporal_versioned or key_based
    #[arg(short, long)]
    strategy: Option<String>,

    /// Use this id instead of generating one.
    #[arg(long)]
    cache_id: Option<String>,

    #[arg(long)]
    file_id: Option<String>,

    /// Required for key_based.
    #[arg(long)]
    semantic_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct Target {
    /// Cache id of the version.
    id: String,

    #[arg(short, long)]
    namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a text payload.
    StoreString {
        /// Text to store. Read from --file or stdin if omitted.
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Store a JSON document.
    StoreJson {
        /// JSON text. Read from --file or stdin if omitted.
        json: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Top-level keys left out of the hash.
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        /// Hash only this dotted field path.
        #[arg(long, conflicts_with = "exclude")]
        field: Option<String>,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Store a binary file.
    StoreBinary {
        file: PathBuf,
        /// The file is gzip-compressed; hash its decompressed bytes.
        #[arg(long)]
        gzip: bool,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Read a version by id.
    Get {
        #[command(flatten)]
        target: Target,
        /// Write content here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the metadata sidecar instead of the content.
        #[arg(long)]
        metadata: bool,
    },

    /// Read the latest version with a content hash.
    GetByHash {
        hash: String,
        #[arg(short, long)]
        namespace: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the index records of a version.
    Refs {
        #[command(flatten)]
        target: Target,
        /// Include every sidecar and index file.
        #[arg(long)]
        details: bool,
    },

    /// Show the config sidecar of a version.
    Config {
        #[command(flatten)]
        target: Target,
    },

    /// Delete a version.
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Overwrite a version's content in place.
    Update {
        #[command(flatten)]
        target: Target,
        /// New content. Read from --file or stdin if omitted.
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// File counts per namespace.
    Stats {
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Store a zip archive.
    ZipStore {
        file: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// List files in an archive version.
    ZipList {
        #[command(flatten)]
        target: Target,
    },

    /// Extract one file from an archive version.
    ZipGet {
        #[command(flatten)]
        target: Target,
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add a file, producing a new version.
    ZipAdd {
        #[command(flatten)]
        target: Target,
        path: String,
        /// Inline content. Use --file for binary data.
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Remove a file, producing a new version.
    ZipRemove {
        #[command(flatten)]
        target: Target,
        path: String,
    },

    /// Replace an existing file, producing a new version.
    ZipReplace {
        #[command(flatten)]
        target: Target,
        path: String,
        /// Inline content. Use --file for binary data.
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Move a file to a new path, producing a new version.
    #[command(alias = "zip-move")]
    ZipRename {
        #[command(flatten)]
        target: Target,
        path: String,
        new_path: String,
    },

    /// Apply a JSON file of operations as one new version.
    ZipBatch {
        #[command(flatten)]
        target: Target,
        operations: PathBuf,
        /// Record failures and keep going instead of rolling back.
        #[arg(long)]
        non_atomic: bool,
    },

    /// Write the raw archive bytes of a version.
    ZipDownload {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// One entry of a `zip-batch` operations file.
#[derive(Debug, Deserialize)]
struct OperationSpec {
    action: BatchAction,
    path: Option<String>,
    content: Option<String>,
    /// Read content from this file instead.
    content_file: Option<PathBuf>,
    new_path: Option<String>,
    pattern: Option<String>,
    #[serde(default)]
    condition: BatchCondition,
}

/// A bare list of operations, or an object carrying `atomic` as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchFile {
    List(Vec<OperationSpec>),
    Full {
        operations: Vec<OperationSpec>,
        atomic: Option<bool>,
    },
}

impl OperationSpec {
    fn into_operation(self, base: &Path) -> ServiceResult<BatchOperation> {
        let content = match (self.content, self.content_file) {
            (Some(text), _) => Some(text.into_bytes()),
            (None, Some(file)) => Some(fs::read(base.join(file))?),
            (None, None) => None,
        };
        Ok(BatchOperation {
            action: self.action,
            path: self.path,
            content,
            new_path: self.new_path,
            pattern: self.pattern,
            condition: self.condition,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("cachedb=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cachedb=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn open(cli: &Cli) -> ServiceResult<Cache> {
    let mut config = CacheConfig::from_env()?;
    if let Some(mode) = &cli.storage_mode {
        config = config.storage_mode(mode.parse::<StorageMode>()?);
    }
    if let Some(path) = &cli.local_disk_path {
        config = config.local_disk_path(path);
    }
    if let Some(path) = &cli.git_path {
        config = config.git_path(path);
    }
    Cache::open(config)
}

fn run(cli: Cli) -> ServiceResult<ExitCode> {
    let cache = open(&cli)?;
    let service = cache.service();
    let archive = cache.archive();

    match cli.command {
        Command::StoreString { text, file, store } => {
            let text = match text {
                Some(text) => text,
                None => String::from_utf8(read_input(file.as_deref())?)
                    .map_err(|_| CacheError::invalid_input("data", "input is not valid UTF-8"))?,
            };
            let response = service.store_string(&text, store_options(&cache, &store)?)?;
            print_json(&response)
        }

        Command::StoreJson {
            json,
            file,
            exclude,
            field,
            store,
        } => {
            let raw = match json {
                Some(json) => json.into_bytes(),
                None => read_input(file.as_deref())?,
            };
            let value: serde_json::Value = serde_json::from_slice(&raw)?;
            let options = store_options(&cache, &store)?;
            let response = match field {
                Some(field) => service.store_json_field(value, &field, options)?,
                None => {
                    let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
                    service.store_json(value, &exclude, options)?
                }
            };
            print_json(&response)
        }

        Command::StoreBinary { file, gzip, store } => {
            let bytes = fs::read(&file)?;
            let encoding = gzip.then_some(ContentEncoding::Gzip);
            let response = service.store_binary(bytes, encoding, store_options(&cache, &store)?)?;
            print_json(&response)
        }

        Command::Get {
            target,
            output,
            metadata,
        } => {
            let (id, ns) = resolve(&cache, &target)?;
            if metadata {
                return match service.retrieve_metadata(&id, &ns)? {
                    Some(meta) => print_json(&meta),
                    None => Ok(not_found(&format!("cache id {} in namespace {}", id, ns))),
                };
            }
            match service.retrieve_by_id(&id, &ns)? {
                Some(retrieved) => emit_content(&retrieved.content, output.as_deref()),
                None => Ok(not_found(&format!("cache id {} in namespace {}", id, ns))),
            }
        }

        Command::GetByHash {
            hash,
            namespace,
            output,
        } => {
            let hash = CacheHash::new(hash).map_err(CacheError::from)?;
            let ns = namespace_or_default(&cache, namespace.as_deref())?;
            match service.retrieve_by_hash(&hash, &ns)? {
                Some(retrieved) => emit_content(&retrieved.content, output.as_deref()),
                None => Ok(not_found(&format!("hash {} in namespace {}", hash, ns))),
            }
        }

        Command::Refs { target, details } => {
            let (id, ns) = resolve(&cache, &target)?;
            let found = if details {
                service.retrieve_details(&id, &ns)?.map(serde_json::to_value).transpose()?
            } else {
                service.retrieve_refs(&id, &ns)?.map(serde_json::to_value).transpose()?
            };
            match found {
                Some(value) => print_json(&value),
                None => Ok(not_found(&format!("cache id {} in namespace {}", id, ns))),
            }
        }

        Command::Config { target } => {
            let (id, ns) = resolve(&cache, &target)?;
            match service.retrieve_config(&id, &ns)? {
                Some(config) => print_json(&config),
                None => Ok(not_found(&format!("cache id {} in namespace {}", id, ns))),
            }
        }

        Command::Delete { target } => {
            let (id, ns) = resolve(&cache, &target)?;
            match service.delete_by_id(&id, &ns)? {
                Some(report) => print_json(&report),
                None => Ok(not_found(&format!("cache id {} in namespace {}", id, ns))),
            }
        }

        Command::Update {
            target,
            content,
            file,
        } => {
            let (id, ns) = resolve(&cache, &target)?;
            let Some(refs) = service.retrieve_refs(&id, &ns)? else {
                return Ok(not_found(&format!("cache id {} in namespace {}", id, ns)));
            };
            let raw = match content {
                Some(content) => content.into_bytes(),
                None => read_input(file.as_deref())?,
            };
            let content = match refs.content_kind {
                ContentKind::String => CacheContent::String(
                    String::from_utf8(raw)
                        .map_err(|_| CacheError::invalid_input("content", "input is not valid UTF-8"))?,
                ),
                ContentKind::Json => CacheContent::Json(serde_json::from_slice(&raw)?),
                ContentKind::Binary => CacheContent::Binary(raw),
            };
            match service.update_content(&id, &ns, &content)? {
                Some(report) => print_json(&report),
                None => Ok(not_found(&format!("cache id {} in namespace {}", id, ns))),
            }
        }

        Command::Stats { namespace } => match namespace {
            Some(name) => {
                let ns = Namespace::new(name).map_err(CacheError::from)?;
                print_json(&service.namespace_stats(&ns)?)
            }
            None => {
                let mut all = Vec::new();
                for ns in service.list_namespaces()? {
                    all.push(service.namespace_stats(&ns)?);
                }
                print_json(&all)
            }
        },

        Command::ZipStore { file, store } => {
            let bytes = fs::read(&file)?;
            let response = archive.store_archive(bytes, store_options(&cache, &store)?)?;
            print_json(&response)
        }

        Command::ZipList { target } => {
            let (id, ns) = resolve(&cache, &target)?;
            report(archive.single_operation(&id, &ns, ArchiveOperation::List)?)
        }

        Command::ZipGet {
            target,
            path,
            output,
        } => {
            let (id, ns) = resolve(&cache, &target)?;
            let result = archive.single_operation(&id, &ns, ArchiveOperation::Get { path })?;
            match (result.file_content.clone(), output) {
                (Some(bytes), Some(output)) => {
                    fs::write(&output, bytes)?;
                    report(result)
                }
                (Some(bytes), None) => {
                    io::stdout().write_all(&bytes)?;
                    Ok(ExitCode::SUCCESS)
                }
                (None, _) => report(result),
            }
        }

        Command::ZipAdd {
            target,
            path,
            content,
            file,
        } => {
            let (id, ns) = resolve(&cache, &target)?;
            let content = match content {
                Some(content) => content.into_bytes(),
                None => read_input(file.as_deref())?,
            };
            report(archive.single_operation(&id, &ns, ArchiveOperation::Add { path, content })?)
        }

        Command::ZipRemove { target, path } => {
            let (id, ns) = resolve(&cache, &target)?;
            report(archive.single_operation(&id, &ns, ArchiveOperation::Remove { path })?)
        }

        Command::ZipReplace {
            target,
            path,
            content,
            file,
        } => {
            let (id, ns) = resolve(&cache, &target)?;
            let content = match content {
                Some(content) => content.into_bytes(),
                None => read_input(file.as_deref())?,
            };
            report(archive.single_operation(&id, &ns, ArchiveOperation::Replace { path, content })?)
        }

        Command::ZipRename { target, path, new_path } => {
            let (id, ns) = resolve(&cache, &target)?;
            report(archive.single_operation(&id, &ns, ArchiveOperation::Move { path, new_path })?)
        }

        Command::ZipBatch {
            target,
            operations,
            non_atomic,
        } => {
            let (id, ns) = resolve(&cache, &target)?;
            let (specs, atomic) = match serde_json::from_slice::<BatchFile>(&fs::read(&operations)?)? {
                BatchFile::List(specs) => (specs, !non_atomic),
                BatchFile::Full { operations, atomic } => (operations, atomic.unwrap_or(true) && !non_atomic),
            };
            let base = operations.parent().unwrap_or_else(|| Path::new("."));
            let ops = specs
                .into_iter()
                .map(|spec| spec.into_operation(base))
                .collect::<ServiceResult<Vec<_>>>()?;

            let result = archive.batch_operation(&id, &ns, &ops, atomic)?;
            let code = if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE };
            print_json(&result)?;
            Ok(code)
        }

        Command::ZipDownload { target, output } => {
            let (id, ns) = resolve(&cache, &target)?;
            match archive.download(&id, &ns)? {
                Some(bytes) => {
                    write_output(&bytes, output.as_deref())?;
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(not_found(&format!("archive {} in namespace {}", id, ns))),
            }
        }
    }
}

fn namespace_or_default(cache: &Cache, name: Option<&str>) -> ServiceResult<Namespace> {
    match name {
        Some(name) => Ok(Namespace::new(name).map_err(CacheError::from)?),
        None => Ok(cache.config().default_namespace.clone()),
    }
}

fn resolve(cache: &Cache, target: &Target) -> ServiceResult<(CacheId, Namespace)> {
    let id = CacheId::new(target.id.as_str()).map_err(CacheError::from)?;
    Ok((id, namespace_or_default(cache, target.namespace.as_deref())?))
}

fn store_options(cache: &Cache, args: &StoreArgs) -> ServiceResult<StoreOptions> {
    let mut options = cache.options(Some(namespace_or_default(cache, args.namespace.as_deref())?));
    if let Some(strategy) = &args.strategy {
        options = options.strategy(strategy.parse::<StorageStrategy>().map_err(CacheError::from)?);
    }
    if let Some(id) = &args.cache_id {
        options = options.cache_id(CacheId::new(id.as_str()).map_err(CacheError::from)?);
    }
    if let Some(id) = &args.file_id {
        options = options.file_id(CacheId::new(id.as_str()).map_err(CacheError::from)?);
    }
    if let Some(key) = &args.semantic_key {
        options = options.semantic_key(SemanticKey::new(key.as_str()).map_err(CacheError::from)?);
    }
    Ok(options)
}

/// Bytes from `file`, or stdin when no file is given.
fn read_input(file: Option<&Path>) -> ServiceResult<Vec<u8>> {
    match file {
        Some(path) => Ok(fs::read(path)?),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_output(bytes: &[u8], output: Option<&Path>) -> ServiceResult<()> {
    match output {
        Some(path) => fs::write(path, bytes)?,
        None => io::stdout().write_all(bytes)?,
    }
    Ok(())
}

fn emit_content(content: &CacheContent, output: Option<&Path>) -> ServiceResult<ExitCode> {
    let bytes = match content {
        CacheContent::String(text) => text.clone().into_bytes(),
        CacheContent::Json(value) => serde_json::to_vec_pretty(value)?,
        CacheContent::Binary(bytes) => bytes.clone(),
    };
    write_output(&bytes, output)?;
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> ServiceResult<ExitCode> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(ExitCode::SUCCESS)
}

/// Print an archive result; failed operations exit non-zero.
fn report(result: cachedb::archive::ArchiveOperationResult) -> ServiceResult<ExitCode> {
    print_json(&result)?;
    Ok(if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn not_found(what: &str) -> ExitCode {
    eprintln!("Not found: {}", what);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_store_string() {
        let cli = Cli::try_parse_from(["cachedb", "store-string", "hello", "-n", "ns1", "-s", "temporal"]).unwrap();
        match cli.command {
            Command::StoreString { text, store, .. } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert_eq!(store.namespace.as_deref(), Some("ns1"));
                assert_eq!(store.strategy.as_deref(), Some("temporal"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_parse_store_json_exclude_list() {
        let cli = Cli::try_parse_from(["cachedb", "store-json", "{}", "--exclude", "ts,request_id"]).unwrap();
        if let Command::StoreJson { exclude, field, .. } = cli.command {
            assert_eq!(exclude, vec!["ts", "request_id"]);
            assert!(field.is_none());
        } else {
            panic!("expected store-json");
        }
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "cachedb",
            "stats",
            "--storage-mode",
            "memory",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.storage_mode.as_deref(), Some("memory"));
    }

    #[test]
    fn cli_parse_zip_batch() {
        let cli = Cli::try_parse_from(["cachedb", "zip-batch", "01abc", "ops.json", "--non-atomic"]).unwrap();
        if let Command::ZipBatch {
            target,
            operations,
            non_atomic,
        } = cli.command
        {
            assert_eq!(target.id, "01abc");
            assert_eq!(operations, PathBuf::from("ops.json"));
            assert!(non_atomic);
        } else {
            panic!("expected zip-batch");
        }
    }

    #[test]
    fn cli_parse_zip_replace() {
        let cli = Cli::try_parse_from(["cachedb", "zip-replace", "01abc", "docs/a.txt", "new body"]).unwrap();
        if let Command::ZipReplace {
            target,
            path,
            content,
            file,
        } = cli.command
        {
            assert_eq!(target.id, "01abc");
            assert_eq!(path, "docs/a.txt");
            assert_eq!(content.as_deref(), Some("new body"));
            assert!(file.is_none());
        } else {
            panic!("expected zip-replace");
        }

        let cli = Cli::try_parse_from(["cachedb", "zip-replace", "01abc", "logo.png", "--file", "logo.png"]).unwrap();
        assert!(matches!(cli.command, Command::ZipReplace { file: Some(_), content: None, .. }));
    }

    #[test]
    fn cli_parse_zip_rename() {
        for name in ["zip-rename", "zip-move"] {
            let cli = Cli::try_parse_from(["cachedb", name, "01abc", "old.txt", "dir/new.txt"]).unwrap();
            match cli.command {
                Command::ZipRename { target, path, new_path } => {
                    assert_eq!(target.id, "01abc");
                    assert_eq!(path, "old.txt");
                    assert_eq!(new_path, "dir/new.txt");
                }
                other => panic!("unexpected command {:?}", other),
            }
        }
        assert!(Cli::try_parse_from(["cachedb", "zip-rename", "01abc", "old.txt"]).is_err());
    }

    #[test]
    fn batch_file_forms() {
        let list: BatchFile = serde_json::from_str(r#"[{"action": "add", "path": "a.txt", "content": "x"}]"#).unwrap();
        assert!(matches!(list, BatchFile::List(ref ops) if ops.len() == 1));

        let full: BatchFile = serde_json::from_str(
            r#"{"atomic": false, "operations": [{"action": "remove", "pattern": "*.log", "condition": "if_exists"}]}"#,
        )
        .unwrap();
        match full {
            BatchFile::Full { operations, atomic } => {
                assert_eq!(atomic, Some(false));
                let op = operations.into_iter().next().unwrap().into_operation(Path::new(".")).unwrap();
                assert_eq!(op.action, BatchAction::Remove);
                assert_eq!(op.pattern.as_deref(), Some("*.log"));
                assert_eq!(op.condition, BatchCondition::IfExists);
            }
            BatchFile::List(_) => panic!("expected object form"),
        }
    }
}
