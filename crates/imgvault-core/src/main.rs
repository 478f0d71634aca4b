//! `imgvault` command line

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use imgvault_core::{ImageManager, RebuildOutcome, Settings};
use imgvault_vault::{FsVault, VaultPath};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let image = || Arg::new("image").required(true).help("Vault-relative image path");

    Command::new("imgvault")
        .version(imgvault_core::VERSION)
        .about("Track, rename and clean up images in a markdown vault")
        .subcommand_required(true)
        .arg(
            Arg::new("vault")
                .long("vault")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Vault root directory"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Settings file (TOML)"),
        )
        .subcommand(Command::new("scan").about("List images no note embeds"))
        .subcommand(
            Command::new("refs")
                .about("List notes embedding an image")
                .arg(image()),
        )
        .subcommand(
            Command::new("info")
                .about("Show everything known about an image as JSON")
                .arg(image()),
        )
        .subcommand(
            Command::new("rename")
                .about("Move an image and rewrite every link to it")
                .arg(Arg::new("old").required(true).help("Current image path"))
                .arg(Arg::new("new").required(true).help("New image path")),
        )
        .subcommand(
            Command::new("clean")
                .about("Delete or relocate orphaned images")
                .arg(
                    Arg::new("delete")
                        .long("delete")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("move")
                        .help("Delete orphans"),
                )
                .arg(
                    Arg::new("move")
                        .long("move")
                        .action(ArgAction::SetTrue)
                        .help("Move orphans into the orphan folder"),
                ),
        )
        .subcommand(
            Command::new("dedup")
                .about("Find an image in the vault with the same bytes as a file")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File outside or inside the vault"),
                ),
        )
        .subcommand(
            Command::new("paste")
                .about("Store image bytes for a note and print the embed")
                .arg(Arg::new("note").required(true).help("Vault-relative note path"))
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image file to paste"),
                )
                .arg(Arg::new("as").long("as").help("Desired vault path for the image")),
        )
        .subcommand(Command::new("rehash").about("Rebuild the hash cache"))
}

fn vault_path(args: &ArgMatches, id: &str) -> anyhow::Result<VaultPath> {
    let raw = args
        .get_one::<String>(id)
        .with_context(|| format!("missing argument {id}"))?;
    VaultPath::parse(raw).with_context(|| format!("invalid vault path {raw:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let root = matches
        .get_one::<PathBuf>("vault")
        .context("--vault is required")?;
    let settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let mut manager = ImageManager::open(FsVault::new(root), settings)
        .await
        .with_context(|| format!("cannot open vault at {}", root.display()))?;

    match matches.subcommand() {
        Some(("scan", _)) => {
            for orphan in manager.orphans() {
                println!("{orphan}");
            }
        }
        Some(("refs", args)) => {
            let image = vault_path(args, "image")?;
            for note in manager.notes_referencing(&image) {
                println!("{note}");
            }
        }
        Some(("info", args)) => {
            let image = vault_path(args, "image")?;
            let info = manager.image_info(&image).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Some(("rename", args)) => {
            let old = vault_path(args, "old")?;
            let new = vault_path(args, "new")?;
            let updated = manager.rename_image(&old, &new).await?;
            println!("Moved {old} to {new}, updated {updated} notes");
        }
        Some(("clean", args)) => {
            let orphans: Vec<VaultPath> = manager.orphans().iter().cloned().collect();
            if args.get_flag("delete") {
                let deleted = manager.delete_orphans(&orphans).await;
                println!("Deleted {deleted} of {} orphans", orphans.len());
            } else if args.get_flag("move") {
                let moved = manager.move_orphans(&orphans).await?;
                for (from, to) in &moved {
                    println!("{from} -> {to}");
                }
                println!("Moved {} of {} orphans", moved.len(), orphans.len());
            } else {
                bail!("clean needs --delete or --move");
            }
        }
        Some(("dedup", args)) => {
            let file = args.get_one::<PathBuf>("file").context("missing argument file")?;
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            match manager.find_duplicate(&bytes).await? {
                Some(existing) => println!("{existing}"),
                None => println!("No duplicate found"),
            }
        }
        Some(("paste", args)) => {
            let note = vault_path(args, "note")?;
            let file = args.get_one::<PathBuf>("file").context("missing argument file")?;
            let desired = match args.get_one::<String>("as") {
                Some(raw) => VaultPath::parse(raw)?,
                None => {
                    let name = file
                        .file_name()
                        .and_then(|name| name.to_str())
                        .context("file name is not valid UTF-8")?;
                    VaultPath::in_folder(note.folder(), name)?
                }
            };
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let pasted = manager.ingest_paste(&note, &bytes, &desired).await?;
            if pasted.reused {
                eprintln!("Reusing existing image {}", pasted.path);
            }
            println!("{}", pasted.embed);
        }
        Some(("rehash", _)) => match manager.rebuild_hashes().await? {
            RebuildOutcome::Completed { hashed, failed } => {
                println!("Hashed {hashed} images, {failed} unreadable");
            }
            RebuildOutcome::Superseded => println!("Rebuild superseded"),
        },
        _ => {}
    }

    manager.shutdown().await?;
    Ok(())
}
