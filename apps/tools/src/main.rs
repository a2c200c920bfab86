mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    directory, AuthProvider, CommitOutcome, DropTarget, EditorError, EditorSnapshot, ItemDraft,
    ItemEdit, RecordStore, StorageAuthProvider, TierListEditor,
};
use shared::{
    domain::{ItemId, ListId, TierColor},
    error::ApiError,
};
use storage::Storage;
use tracing_subscriber::EnvFilter;

use config::{load_settings, prepare_database_url, Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "tierlist", about = "Edit tier lists stored in a local SQLite file")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides `database_url` from the settings file and environment.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    email: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers a new account.
    Signup,
    NewList {
        title: String,
    },
    Lists,
    Show {
        list_id: i64,
        #[arg(long, conflicts_with = "css")]
        json: bool,
        /// Prints each tier's header gradient as a CSS value.
        #[arg(long)]
        css: bool,
    },
    AddTier {
        list_id: i64,
        name: String,
        #[arg(long, requires = "to")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
    DeleteTier {
        list_id: i64,
        name: String,
    },
    /// Drops tier `name` onto tier `onto`.
    MoveTier {
        list_id: i64,
        name: String,
        onto: String,
    },
    RecolorTier {
        list_id: i64,
        name: String,
        from: String,
        to: String,
    },
    AddItem {
        list_id: i64,
        title: String,
        #[arg(long)]
        tier: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
    EditItem {
        list_id: i64,
        item_id: i64,
        #[arg(long)]
        title: Option<String>,
        /// An empty value clears the image.
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        tier: Option<String>,
    },
    DeleteItem {
        list_id: i64,
        item_id: i64,
    },
    /// Drops an item onto a tier zone.
    MoveItem {
        list_id: i64,
        item_id: i64,
        tier: String,
    },
    /// Drops an item onto another item of the same tier.
    ReorderItem {
        list_id: i64,
        item_id: i64,
        onto_item_id: i64,
    },
    Complete {
        list_id: i64,
    },
    Reopen {
        list_id: i64,
    },
}

struct Session {
    settings: Settings,
    store: Arc<dyn RecordStore>,
    auth: Arc<StorageAuthProvider>,
}

impl Session {
    async fn open_editor(&self, list_id: i64) -> Result<TierListEditor> {
        Ok(TierListEditor::open_with_config(
            Arc::clone(&self.store),
            self.auth.clone(),
            ListId(list_id),
            self.settings.editor_config(),
        )
        .await?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config);
    if let Some(database_url) = &cli.database_url {
        settings.database_url = database_url.clone();
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open {database_url}"))?;
    let auth = Arc::new(StorageAuthProvider::new(storage.clone()));
    let session = Session {
        settings,
        store: Arc::new(storage),
        auth,
    };

    let (email, password) = match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => (email.as_str(), password.as_str()),
        _ => bail!("--email and --password are required"),
    };
    if matches!(cli.command, Command::Signup) {
        let created = session.auth.sign_up(email, password).await?;
        println!(
            "registered user_id={} email={}",
            created.identity.user_id, created.identity.email
        );
        return Ok(());
    }
    session.auth.sign_in_with_password(email, password).await?;

    if let Err(err) = run(&session, cli.command).await {
        let Some(editor_err) = err.downcast_ref::<EditorError>() else {
            return Err(err);
        };
        let api_error = ApiError::from(editor_err.clone());
        eprintln!("{}", serde_json::to_string(&api_error)?);
        if api_error.suggests_reload() {
            eprintln!("run `tierlist show` to see what is stored");
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Signup => {}
        Command::NewList { title } => {
            let list =
                directory::create_list(session.store.as_ref(), session.auth.as_ref(), &title)
                    .await?;
            println!("created list_id={} title={}", list.id, list.title);
        }
        Command::Lists => {
            let lists =
                directory::list_lists(session.store.as_ref(), session.auth.as_ref()).await?;
            for list in lists {
                let state = if list.is_completed { "completed" } else { "open" };
                println!(
                    "{}\t{}\t{}\t{}",
                    list.id,
                    state,
                    list.created_at.format("%Y-%m-%d %H:%M"),
                    list.title
                );
            }
        }
        Command::Show { list_id, json, css } => {
            let snapshot = session.open_editor(list_id).await?.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else if css {
                for view in &snapshot.tiers {
                    println!("{}\t{}", view.tier.name, view.tier.color().css_gradient());
                }
            } else {
                print_snapshot(&snapshot);
            }
        }
        Command::AddTier {
            list_id,
            name,
            from,
            to,
        } => {
            let color = from.zip(to).map(|(from, to)| TierColor::new(from, to));
            let tier = session
                .open_editor(list_id)
                .await?
                .add_tier(&name, color)
                .await?;
            println!("created tier '{}' position={}", tier.name, tier.position);
        }
        Command::DeleteTier { list_id, name } => {
            session.open_editor(list_id).await?.delete_tier(&name).await?;
            println!("deleted tier '{name}'");
        }
        Command::MoveTier {
            list_id,
            name,
            onto,
        } => {
            let editor = session.open_editor(list_id).await?;
            if editor.drop_tier_on(&name, &onto).await? {
                println!("tiers: {}", editor.snapshot().await.tier_names().join(" "));
            } else {
                println!("tier order unchanged");
            }
        }
        Command::RecolorTier {
            list_id,
            name,
            from,
            to,
        } => {
            session
                .open_editor(list_id)
                .await?
                .recolor_tier(&name, TierColor::new(from, to))
                .await?;
            println!("recolored tier '{name}'");
        }
        Command::AddItem {
            list_id,
            title,
            tier,
            image_url,
        } => {
            let item = session
                .open_editor(list_id)
                .await?
                .add_item(ItemDraft {
                    title,
                    image_url,
                    tier,
                })
                .await?;
            println!(
                "created item_id={} tier='{}' position={}",
                item.id, item.tier, item.position
            );
        }
        Command::EditItem {
            list_id,
            item_id,
            title,
            image_url,
            tier,
        } => {
            let item = session
                .open_editor(list_id)
                .await?
                .edit_item(
                    ItemId(item_id),
                    ItemEdit {
                        title,
                        image_url,
                        tier,
                    },
                )
                .await?;
            println!("updated item_id={} tier='{}'", item.id, item.tier);
        }
        Command::DeleteItem { list_id, item_id } => {
            session
                .open_editor(list_id)
                .await?
                .delete_item(ItemId(item_id))
                .await?;
            println!("deleted item_id={item_id}");
        }
        Command::MoveItem {
            list_id,
            item_id,
            tier,
        } => {
            let editor = session.open_editor(list_id).await?;
            editor.pick_up(ItemId(item_id)).await?;
            editor.hover(Some(DropTarget::zone(tier.clone()))).await;
            let outcome = editor.drop_on(Some(DropTarget::zone(tier))).await?;
            print_outcome(&outcome);
        }
        Command::ReorderItem {
            list_id,
            item_id,
            onto_item_id,
        } => {
            let editor = session.open_editor(list_id).await?;
            editor.pick_up(ItemId(item_id)).await?;
            let target = DropTarget::Item(ItemId(onto_item_id));
            editor.hover(Some(target.clone())).await;
            let outcome = editor.drop_on(Some(target)).await?;
            print_outcome(&outcome);
        }
        Command::Complete { list_id } => {
            session.open_editor(list_id).await?.complete().await?;
            println!("list {list_id} completed");
        }
        Command::Reopen { list_id } => {
            session.open_editor(list_id).await?.reopen().await?;
            println!("list {list_id} reopened");
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &EditorSnapshot) {
    let state = if snapshot.is_completed {
        " [completed]"
    } else {
        ""
    };
    println!("{} (list_id={}){state}", snapshot.title, snapshot.list_id);
    for view in &snapshot.tiers {
        let items: Vec<String> = view
            .items
            .iter()
            .map(|item| format!("{}#{}", item.title, item.id))
            .collect();
        println!(
            "  {:<8} [{} -> {}] {}",
            view.tier.name,
            view.tier.color_from,
            view.tier.color_to,
            items.join(", ")
        );
    }
}

fn print_outcome(outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::Moved {
            item_id,
            from_tier,
            to_tier,
        } => println!("moved item_id={item_id} from '{from_tier}' to '{to_tier}'"),
        CommitOutcome::Reordered {
            item_id,
            tier,
            written,
        } => println!("reordered item_id={item_id} in '{tier}' ({written} rows written)"),
        CommitOutcome::Skipped(reason) => println!("nothing to do: {reason:?}"),
    }
}
