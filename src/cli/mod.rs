pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "atrio")]
#[command(about = "Atrio authorization core - operations CLI")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Seed the role and permission catalog")]
    Seed,

    #[command(about = "Run the multi-tenant integrity audit")]
    Audit,

    #[command(about = "Run the live data isolation probe against one project")]
    IsolationTest {
        #[arg(long, help = "Client id the probe writes under")]
        client_id: i64,

        #[arg(long, help = "Project id the probe writes under")]
        project_id: i64,

        #[arg(long, help = "Attribute the probe row to this account")]
        user_email: Option<String>,
    },

    #[command(about = "Create a user account")]
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        display_name: String,

        #[arg(long, help = "Bind the account to a client")]
        client_id: Option<i64>,
    },

    #[command(about = "Grant the super_admin role to a user")]
    GrantSuperAdmin {
        #[arg(long)]
        email: String,
    },
}

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Seed => commands::catalog::seed(output_format).await,
        Commands::Audit => commands::integrity::audit(output_format).await,
        Commands::IsolationTest {
            client_id,
            project_id,
            user_email,
        } => commands::integrity::isolation_test(client_id, project_id, user_email, output_format)
            .await,
        Commands::CreateUser {
            email,
            password,
            display_name,
            client_id,
        } => commands::users::create_user(email, password, display_name, client_id, output_format)
            .await,
        Commands::GrantSuperAdmin { email } => {
            commands::users::grant_super_admin(email, output_format).await
        }
    }
}
