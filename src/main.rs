use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kinship::{Config, FamilyTree, NewPerson, PersonHandle, SqliteFamilyStore};
use kinship::db::Db;
use serde::Serialize;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "kinship")]
#[command(about = "Record family relationships and compute kinship over a SQLite genealogy store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// Add a person and print the new handle
    AddPerson {
        name: String,
        #[arg(long)]
        gender: Option<String>,
        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        born: Option<NaiveDate>,
        #[arg(long)]
        birthplace: Option<String>,
        /// Date of death, YYYY-MM-DD
        #[arg(long)]
        died: Option<NaiveDate>,
        #[arg(long)]
        deathplace: Option<String>,
        #[arg(long)]
        occupation: Option<String>,
    },

    /// Record CHILD as a child of PARENT (and of PARENT's current partner)
    RecordChild { parent: PersonHandle, child: PersonHandle },

    /// Record two people as partners
    RecordPartnering { first: PersonHandle, second: PersonHandle },

    /// End the partnership between two people
    RecordDissolution { first: PersonHandle, second: PersonHandle },

    /// Cousinship and level of removal between two people
    Relation { first: PersonHandle, second: PersonHandle },

    /// Ancestors within a number of generations
    Ancestors {
        person: PersonHandle,
        #[arg(short, long, default_value_t = 1)]
        generations: u32,
    },

    /// Descendants within a number of generations
    Descendants {
        person: PersonHandle,
        #[arg(short, long, default_value_t = 1)]
        generations: u32,
    },

    /// A person with parents, children and partners
    Show { person: PersonHandle },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.log_level())
    ).init();

    log::debug!("Database path: {}", config.db_path().display());
    let store = SqliteFamilyStore::new(Db::new(config.db_path()));
    let applied = store
        .migrate(config.migrations_dir())
        .await
        .with_context(|| format!("Failed to migrate {}", config.db_path().display()))?;

    let tree = FamilyTree::new(store).with_generation_mode(config.generation_mode());
    log::debug!("Generation mode: {:?}", tree.generation_mode());

    match cli.command {
        Command::Migrate => print_json(&json!({ "applied": applied }))?,
        Command::AddPerson {
            name,
            gender,
            born,
            birthplace,
            died,
            deathplace,
            occupation,
        } => {
            let person = NewPerson {
                name,
                gender,
                date_of_birth: born,
                place_of_birth: birthplace,
                date_of_death: died,
                place_of_death: deathplace,
                occupation,
            };
            let id = tree.add_person(&person).await?;
            print_json(&json!({ "id": id }))?;
        }
        Command::RecordChild { parent, child } => {
            tree.record_child(parent, child).await?;
            print_json(&tree.describe(child).await?)?;
        }
        Command::RecordPartnering { first, second } => {
            tree.record_partnering(first, second).await?;
            print_json(&tree.describe(first).await?)?;
        }
        Command::RecordDissolution { first, second } => {
            tree.record_dissolution(first, second).await?;
            print_json(&tree.describe(first).await?)?;
        }
        Command::Relation { first, second } => {
            let relation = tree.find_relation(first, second).await?;
            print_json(&json!({
                "first": first,
                "second": second,
                "related": relation.is_related(),
                "cousinship": relation.cousinship,
                "level_of_removal": relation.level_of_removal,
            }))?;
        }
        Command::Ancestors { person, generations } => {
            print_json(&tree.ancestors(person, generations).await?)?;
        }
        Command::Descendants { person, generations } => {
            print_json(&tree.descendants(person, generations).await?)?;
        }
        Command::Show { person } => print_json(&tree.describe(person).await?)?,
    }

    Ok(())
}
