use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{ContactListController, ControllerError};
use shared::{
    domain::{Contact, ContactForm, ContactId},
    error::ApiError,
};
use storage::{demo_contacts, ContactStore, InMemoryContactStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, LoadedSettings};

/// Pause between simulated keystrokes; shorter than the quiescence window.
const TYPING_INTERVAL: Duration = Duration::from_millis(60);

#[derive(Parser, Debug)]
#[command(name = "contacts", about = "In-memory contact manager")]
struct Cli {
    /// TOML settings file; defaults to ./contacts.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print results and errors as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every contact.
    List,
    /// Type a query into the filter box and print the settled result.
    Search { query: String },
    /// Show one contact with its age.
    Show { id: i64 },
    /// Add a contact.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        dob: String,
        #[command(flatten)]
        optional: OptionalFields,
    },
    /// Edit fields of an existing contact.
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        dob: Option<String>,
        #[command(flatten)]
        optional: OptionalFields,
    },
    /// Delete a contact.
    Delete { id: i64 },
    /// Run a scripted session: search, add, edit and delete.
    Demo,
}

#[derive(Args, Debug, Default)]
struct OptionalFields {
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

impl OptionalFields {
    fn apply(self, form: &mut ContactForm) {
        if let Some(v) = self.phone {
            form.phone = v;
        }
        if let Some(v) = self.address {
            form.address = v;
        }
        if let Some(v) = self.email {
            form.email = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let LoadedSettings {
        settings,
        source,
        warnings,
    } = load_settings(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    for warning in warnings {
        warn!("{warning}");
    }
    info!(config = ?source, latency_ms = settings.store_latency_ms, "starting contacts");

    let store: Arc<dyn ContactStore> = Arc::new(InMemoryContactStore::with_contacts(
        settings.store_latency(),
        demo_contacts(),
    )?);
    let mut controller = ContactListController::new(store, settings.controller_settings())?;
    let json = cli.json;

    match run(&mut controller, cli.command, json).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                if let Some(controller_err) = err.downcast_ref::<ControllerError>() {
                    println!("{}", serde_json::to_string(&ApiError::from(controller_err))?);
                    std::process::exit(1);
                }
            }
            Err(err)
        }
    }
}

async fn run(controller: &mut ContactListController, command: Command, json: bool) -> Result<()> {
    controller.load().await?;

    match command {
        Command::List => print_contacts(controller.filtered_view(), json)?,
        Command::Search { query } => {
            type_query(controller, &query).await;
            print_contacts(controller.filtered_view(), json)?;
        }
        Command::Show { id } => {
            controller.select(ContactId(id))?;
            print_selected(controller, json)?;
        }
        Command::Add {
            name,
            dob,
            optional,
        } => {
            controller.add()?;
            let form = controller.form_mut()?;
            form.name = name;
            form.dob = dob;
            optional.apply(form);
            let created = controller.save_and_close().await?;
            print_contact(&created, json)?;
        }
        Command::Edit {
            id,
            name,
            dob,
            optional,
        } => {
            controller.select(ContactId(id))?;
            controller.edit()?;
            let form = controller.form_mut()?;
            if let Some(v) = name {
                form.name = v;
            }
            if let Some(v) = dob {
                form.dob = v;
            }
            optional.apply(form);
            let updated = controller.save_and_close().await?;
            print_contact(&updated, json)?;
        }
        Command::Delete { id } => {
            controller.select(ContactId(id))?;
            let deleted = controller.delete()?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("deleted contact_id={deleted}");
            }
        }
        Command::Demo => run_demo(controller, json).await?,
    }

    Ok(())
}

/// Feeds `query` into the filter one keystroke at a time, then waits for the
/// settled result.
async fn type_query(controller: &mut ContactListController, query: &str) {
    let mut typed = String::new();
    for ch in query.chars() {
        typed.push(ch);
        controller.on_filter_text_changed(typed.clone());
        tokio::time::sleep(TYPING_INTERVAL).await;
    }
    if query.is_empty() {
        controller.on_filter_text_changed("");
    }
    controller.wait_for_filter().await;
}

async fn run_demo(controller: &mut ContactListController, json: bool) -> Result<()> {
    println!("== all contacts");
    print_contacts(controller.filtered_view(), json)?;

    println!("== search \"gmail\"");
    type_query(controller, "gmail").await;
    print_contacts(controller.filtered_view(), json)?;

    println!("== add");
    controller.add()?;
    {
        let form = controller.form_mut()?;
        form.name = "Laura Gomez".into();
        form.dob = "1995-11-02".into();
        form.email = "laura.gomez@gmail.com".into();
    }
    let created = controller.save().await?;
    print_contact(&created, json)?;

    println!("== edit");
    controller.select(created.id)?;
    controller.edit()?;
    controller.form_mut()?.phone = "3201234567".into();
    controller.save().await?;
    print_selected(controller, json)?;
    controller.close();

    println!("== delete");
    controller.select(created.id)?;
    controller.delete()?;
    print_contacts(controller.filtered_view(), json)?;

    Ok(())
}

fn print_contacts(contacts: &[Contact], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(contacts)?);
        return Ok(());
    }
    if contacts.is_empty() {
        println!("(no contacts)");
    }
    for contact in contacts {
        println!("{}", contact_line(contact));
    }
    Ok(())
}

fn print_contact(contact: &Contact, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(contact)?);
    } else {
        println!("{}", contact_line(contact));
    }
    Ok(())
}

fn print_selected(controller: &ContactListController, json: bool) -> Result<()> {
    let Some(contact) = controller.current_contact() else {
        return Ok(());
    };
    let age = controller.working_copy_age();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "contact": contact, "age": age }))?
        );
    } else {
        println!("{}", contact_line(contact));
        println!(
            "  address: {}",
            contact.address.as_deref().unwrap_or("-")
        );
        if let Some(age) = age {
            println!("  age: {age}");
        }
    }
    Ok(())
}

fn contact_line(contact: &Contact) -> String {
    format!(
        "{:>13}  {:<20} {:<12} {:<28} {}",
        contact.id,
        contact.name,
        contact.phone.as_deref().unwrap_or("-"),
        contact.email.as_deref().unwrap_or("-"),
        contact.dob,
    )
}
