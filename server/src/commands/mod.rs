use std::path::PathBuf;

use clap::Subcommand;
use color_eyre::Result;

pub(crate) mod create_superuser;
pub(crate) mod load;
pub(crate) mod serve;

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// Run the HTTP API
    Serve,
    /// Load ingredients from a JSON file of `{"name", "measurement_unit"}` objects
    LoadIngredients {
        #[arg(long)]
        path: PathBuf,
    },
    /// Load tags from a JSON file of `{"name", "color", "slug"}` objects
    LoadTags {
        #[arg(long)]
        path: PathBuf,
    },
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
}

impl Default for Command {
    fn default() -> Self {
        Self::Serve
    }
}

impl Command {
    pub(crate) async fn run(self) -> Result<()> {
        match self {
            Command::Serve => serve::serve().await,
            Command::LoadIngredients { path } => load::load_ingredients(&path).await,
            Command::LoadTags { path } => load::load_tags(&path).await,
            Command::CreateSuperuser {
                email,
                username,
                password,
                first_name,
                last_name,
            } => {
                create_superuser::create_superuser(create_superuser::Superuser {
                    email,
                    username,
                    password,
                    first_name,
                    last_name,
                })
                .await
            }
        }
    }
}
