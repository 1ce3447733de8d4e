// src/main.rs
// Thin CLI over the data layer: the terminal counterpart of the dashboard
// views. Every command maps to one operation plus the cache/poll behavior
// the matching view would use.

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use loadmaster_client::auth::AuthController;
use loadmaster_client::client::Client;
use loadmaster_client::config::ClientConfig;
use loadmaster_client::error::ClientError;
use loadmaster_client::graphql::ops;
use loadmaster_client::poller::StatusPoller;
use loadmaster_client::types::{
    CreateLoadTestInput, LoadTest, LoadTestStatistics, LoadTestUpdate, LoginInput, RegisterInput,
    User,
};

#[derive(Parser)]
#[command(name = "loadmaster", version, about = "LoadMaster load-testing dashboard CLI")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    /// Clear the persisted session and cached data
    Logout,
    /// Show the signed-in profile
    Me,
    /// List all load tests
    Tests,
    /// Show one load test
    Test {
        id: String,
        /// Keep polling until the test reaches a terminal status
        #[arg(long)]
        watch: bool,
    },
    /// Create a load test
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        target_url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long, default_value_t = 10)]
        users: i32,
        #[arg(long, default_value_t = 100)]
        requests: i32,
        #[arg(long, default_value_t = 60)]
        duration: i32,
        #[arg(long, default_value_t = 10)]
        rps: i32,
        #[arg(long)]
        description: Option<String>,
    },
    /// Start a test
    Start { id: String },
    /// Stop a running test
    Stop { id: String },
    /// Delete a test
    Delete { id: String },
    /// Aggregate statistics across all tests
    Stats,
    /// Stream live status updates for the signed-in user's tests
    Events,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClientConfig::from_env();
    let client = Arc::new(Client::new(&config)?);
    let auth = AuthController::new(client.clone());

    match cli.command {
        Commands::Login { email, password } => {
            let session = auth
                .login(LoginInput { email, password })
                .await
                .map_err(render)?;
            if let Some(user) = session.user {
                println!("signed in as {} ({})", user.name, user.email);
            }
        }
        Commands::Register {
            email,
            password,
            name,
        } => {
            let session = auth
                .register(RegisterInput {
                    email,
                    password,
                    name,
                })
                .await
                .map_err(render)?;
            if let Some(user) = session.user {
                println!("account created, signed in as {}", user.email);
            }
        }
        Commands::Logout => {
            auth.logout();
            println!("signed out");
        }
        Commands::Me => {
            let user: User = client.query(&ops::me()).await.map_err(render)?;
            println!("{} <{}>", user.name, user.email);
            println!("plan: {}", user.plan);
            println!("cloud: {}", if user.cloud_enabled { "enabled" } else { "disabled" });
        }
        Commands::Tests => {
            let tests: Vec<LoadTest> = client.query(&ops::load_tests()).await.map_err(render)?;
            if tests.is_empty() {
                println!("no load tests yet");
            }
            for test in tests {
                println!("{}  {:<9}  {}  {}", test.id, test.status, test.method, test.name);
            }
        }
        Commands::Test { id, watch } => {
            let test: Option<LoadTest> =
                client.query(&ops::load_test(&id)).await.map_err(render)?;
            let Some(test) = test else {
                bail!("test {id} not found");
            };
            print_test(&test);

            if watch && !test.status.is_terminal() {
                let poller = StatusPoller::new(client.clone());
                let handle = poller.start(&id, config.poll_interval);
                let mut updates = handle.updates();
                let mut last = test.status;
                while updates.changed().await.is_ok() {
                    let Some(test) = updates.borrow_and_update().clone() else {
                        continue;
                    };
                    if test.status != last {
                        println!("status: {} -> {}", last, test.status);
                        last = test.status;
                    }
                }
                println!("test {id} finished with status {last}");
            }
        }
        Commands::Create {
            name,
            target_url,
            method,
            users,
            requests,
            duration,
            rps,
            description,
        } => {
            let input = CreateLoadTestInput {
                name,
                description,
                target_url,
                method,
                concurrent_users: users,
                total_requests: requests,
                duration_seconds: duration,
                requests_per_second: rps,
                headers: None,
                body: None,
            };
            let created: LoadTest = client
                .mutate(&ops::create_load_test(input), &[ops::load_tests()])
                .await
                .map_err(render)?;
            println!("created test {} ({})", created.id, created.status);
        }
        Commands::Start { id } => {
            let update: LoadTestUpdate = client
                .mutate(&ops::start_load_test(&id), &[ops::load_test(&id)])
                .await
                .map_err(render)?;
            println!("test {} is now {}", update.id, update.status);
        }
        Commands::Stop { id } => {
            let update: LoadTestUpdate = client
                .mutate(&ops::stop_load_test(&id), &[ops::load_test(&id)])
                .await
                .map_err(render)?;
            println!("test {} is now {}", update.id, update.status);
        }
        Commands::Delete { id } => {
            let deleted: bool = client
                .mutate(&ops::delete_load_test(&id), &[ops::load_tests()])
                .await
                .map_err(render)?;
            if deleted {
                println!("deleted test {id}");
            } else {
                bail!("test {id} was not deleted");
            }
        }
        Commands::Stats => {
            let stats: LoadTestStatistics = client
                .query(&ops::load_test_statistics())
                .await
                .map_err(render)?;
            println!("total:     {}", stats.total_tests);
            println!("running:   {}", stats.running_tests);
            println!("completed: {}", stats.completed_tests);
            println!("failed:    {}", stats.failed_tests);
            println!("success:   {:.1}%", stats.success_rate);
        }
        Commands::Events => {
            let Some(user) = client.session().current_user() else {
                bail!("not signed in, run `loadmaster login` first");
            };
            let mut stream = client
                .subscribe::<LoadTestUpdate>(&ops::load_test_updated(&user.id))
                .await
                .map_err(render)?;
            println!("streaming status updates (ctrl-c to quit)");
            while let Some(item) = stream.next().await {
                let update = item.map_err(render)?;
                println!("test {} -> {}", update.id, update.status);
            }
            println!("update stream ended");
        }
    }

    Ok(())
}

fn print_test(test: &LoadTest) {
    println!("{}  [{}]", test.name, test.status);
    if let Some(description) = &test.description {
        println!("{description}");
    }
    println!("target:   {} {}", test.method, test.target_url);
    println!(
        "load:     {} users, {} rps, {} requests over {}s",
        test.concurrent_users, test.requests_per_second, test.total_requests, test.duration_seconds
    );
    if let Some(results) = &test.results {
        if let Some(latest) = results.first() {
            println!(
                "latest:   {}/{} ok, p95 {:.0}ms, {:.1}% errors",
                latest.successful_requests,
                latest.total_requests,
                latest.p95_response_time,
                latest.error_rate
            );
        }
    }
}

/// Keep the two failure families distinguishable at the prompt: field errors
/// come from the API and are worth reading, transport errors mean the
/// endpoint itself was unreachable.
fn render(err: ClientError) -> anyhow::Error {
    match &err {
        ClientError::Api(_) => anyhow::anyhow!("request failed: {err}"),
        ClientError::Unauthorized { .. } => {
            anyhow::anyhow!("session expired or not signed in, run `loadmaster login`")
        }
        ClientError::Transport { .. } => {
            anyhow::anyhow!("could not reach the LoadMaster API: {err}")
        }
    }
}
