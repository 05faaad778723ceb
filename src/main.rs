//! Save Vault command line
//!
//! Inspects and edits save slots stored in a directory.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;

    use save_vault::consts::DEFAULT_SLOT;
    use save_vault::{
        BackupSelector, DirectoryBackend, PathAccessor, SlotStore, StoreConfig,
    };

    const USAGE: &str = "\
usage: save-vault [--dir DIR] [--config FILE] <command>

commands:
  list                        show every slot
  show <slot>                 print the slot's record
  get <slot> <path>           read a payload value
  set <slot> <path> <json>    write a payload value
  incr <slot> <path> [n]      add n (default 1) to a payload number
  export <slot> [out-dir]     write a pretty-printed copy of the record
  import <slot> <file>        load a record file into the slot
  backups <slot>              list backups, newest first
  restore <slot> [timestamp]  roll back to a backup (default: latest)
  delete <slot>               remove the slot and its backups
  copy <from> <to>            copy one slot into another";

    struct Options {
        dir: PathBuf,
        config: Option<PathBuf>,
        command: Vec<String>,
    }

    fn parse_options(args: Vec<String>) -> Result<Options, String> {
        let mut dir = PathBuf::from("saves");
        let mut config: Option<PathBuf> = None;
        let mut command = Vec::new();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--dir" => dir = iter.next().ok_or("--dir needs a value")?.into(),
                "--config" => config = Some(iter.next().ok_or("--config needs a value")?.into()),
                "-h" | "--help" => return Err(USAGE.to_string()),
                _ => command.push(arg),
            }
        }
        if command.is_empty() {
            return Err(USAGE.to_string());
        }
        Ok(Options {
            dir,
            config,
            command,
        })
    }

    fn slot_arg(arg: Option<&String>) -> Result<u32, String> {
        match arg {
            None => Ok(DEFAULT_SLOT),
            Some(s) => s.parse().map_err(|_| format!("invalid slot '{s}'")),
        }
    }

    fn slot_required(arg: Option<&String>, what: &str) -> Result<u32, String> {
        let raw = required(arg, what)?;
        raw.parse().map_err(|_| format!("invalid slot '{raw}'"))
    }

    fn required<'a>(arg: Option<&'a String>, what: &str) -> Result<&'a str, String> {
        arg.map(String::as_str).ok_or_else(|| format!("missing {what}\n\n{USAGE}"))
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
        serde_json::to_string_pretty(value).map_err(|e| e.to_string())
    }

    fn check(ok: bool, what: &str) -> Result<(), String> {
        if ok {
            println!("{what}: ok");
            Ok(())
        } else {
            Err(format!("{what} failed (see log)"))
        }
    }

    pub fn run(args: Vec<String>) -> Result<(), String> {
        let opts = parse_options(args)?;
        let config = match &opts.config {
            Some(path) => StoreConfig::try_load(path).map_err(|e| e.to_string())?,
            None => StoreConfig::default(),
        };
        let backend = DirectoryBackend::open(&opts.dir).map_err(|e| e.to_string())?;
        let mut store = SlotStore::new(backend, config).map_err(|e| e.to_string())?;

        let cmd = &opts.command;
        let arg = |i: usize| cmd.get(i);
        match cmd[0].as_str() {
            "list" => println!("{}", to_json(&store.list_slots())?),
            "show" => {
                let slot = slot_arg(arg(1))?;
                let record = store.load(slot).ok_or(format!("slot {slot} is empty or corrupted"))?;
                println!("{}", to_json(&record)?);
            }
            "get" => {
                let slot = slot_arg(arg(1))?;
                let path = required(arg(2), "path")?;
                let paths = PathAccessor::new(&mut store);
                let value = paths.get(path, slot).ok_or(format!("{path}: not set"))?;
                println!("{}", to_json(&value)?);
            }
            "set" => {
                let slot = slot_arg(arg(1))?;
                let path = required(arg(2), "path")?;
                let raw = required(arg(3), "value")?;
                // Bare words are taken as strings
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                check(PathAccessor::new(&mut store).set(path, value, slot), "set")?;
            }
            "incr" => {
                let slot = slot_arg(arg(1))?;
                let path = required(arg(2), "path")?;
                let amount = match arg(3) {
                    Some(n) => n.parse().map_err(|_| format!("invalid amount '{n}'"))?,
                    None => 1,
                };
                let value = PathAccessor::new(&mut store)
                    .increment(path, amount, slot)
                    .ok_or("increment failed (see log)")?;
                println!("{value}");
            }
            "export" => {
                let slot = slot_arg(arg(1))?;
                let out_dir = arg(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
                let export = store
                    .export_slot(slot)
                    .ok_or(format!("slot {slot} is empty or corrupted"))?;
                let path = out_dir.join(&export.file_name);
                std::fs::write(&path, export.contents).map_err(|e| e.to_string())?;
                println!("exported slot {slot} to {}", path.display());
            }
            "import" => {
                let slot = slot_arg(arg(1))?;
                let file = PathBuf::from(required(arg(2), "file")?);
                let ok = pollster::block_on(
                    store.import(slot, async move { std::fs::read_to_string(&file) }),
                );
                check(ok, "import")?;
            }
            "backups" => {
                let slot = slot_arg(arg(1))?;
                println!("{}", to_json(&store.list_backups(slot))?);
            }
            "restore" => {
                let slot = slot_arg(arg(1))?;
                let selector = match arg(2) {
                    Some(ts) => BackupSelector::At(
                        ts.parse().map_err(|_| format!("invalid timestamp '{ts}'"))?,
                    ),
                    None => BackupSelector::Latest,
                };
                check(store.restore_backup(slot, selector), "restore")?;
            }
            "delete" => {
                let slot = slot_arg(arg(1))?;
                check(store.delete_slot(slot), "delete")?;
            }
            "copy" => {
                let from = slot_required(arg(1), "source slot")?;
                let to = slot_required(arg(2), "target slot")?;
                check(store.copy_slot(from, to), "copy")?;
            }
            other => return Err(format!("unknown command '{other}'\n\n{USAGE}")),
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::debug!("Save Vault (native) starting...");

    if let Err(message) = cli::run(std::env::args().skip(1).collect()) {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser builds use the library with LocalStorageBackend directly
}
